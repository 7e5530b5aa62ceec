//! In-memory store fakes for consumer test suites
//!
//! Both fakes follow the real backends' contracts (column-disjoint upserts,
//! zero affected rows on identical writes) and allow failures to be injected.

use crate::error::{codes, PipelineError, Result};
use crate::status::{ArtifactKind, ProcessingStatus, RecordKey, StatusUpdate};
use crate::store::{ObjectStore, StatusStore};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;

/// Stored copy of one `images` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub filename: String,
    pub thumbnail_ref: Option<String>,
    pub thumbnail_status: ProcessingStatus,
    pub caption_text: Option<String>,
    pub caption_status: ProcessingStatus,
}

impl StoredRecord {
    fn pending(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            thumbnail_ref: None,
            thumbnail_status: ProcessingStatus::Pending,
            caption_text: None,
            caption_status: ProcessingStatus::Pending,
        }
    }

    fn columns_mut(
        &mut self,
        artifact: ArtifactKind,
    ) -> (&mut Option<String>, &mut ProcessingStatus) {
        match artifact {
            ArtifactKind::Thumbnail => (&mut self.thumbnail_ref, &mut self.thumbnail_status),
            ArtifactKind::Caption => (&mut self.caption_text, &mut self.caption_status),
        }
    }
}

#[derive(Default)]
pub struct MemoryStatusStore {
    rows: Mutex<HashMap<String, StoredRecord>>,
    upserts: Mutex<Vec<(RecordKey, StatusUpdate)>>,
    fail_upserts: Mutex<bool>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following upsert fail with a connection error
    pub fn fail_upserts(&self, fail: bool) {
        *self.fail_upserts.lock() = fail;
    }

    pub fn get(&self, business_key: &str) -> Option<StoredRecord> {
        self.rows.lock().get(business_key).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Number of upsert attempts, failed ones included
    pub fn upsert_calls(&self) -> usize {
        self.upserts.lock().len()
    }

    /// Updates passed to upsert, in call order
    pub fn recorded_updates(&self) -> Vec<StatusUpdate> {
        self.upserts.lock().iter().map(|(_, u)| u.clone()).collect()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn upsert(&self, record: &RecordKey, update: &StatusUpdate) -> Result<u64> {
        self.upserts.lock().push((record.clone(), update.clone()));

        if *self.fail_upserts.lock() {
            return Err(PipelineError::status_store(
                codes::DB_CONNECTION_FAILED,
                "Failed to acquire database connection",
                io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            ));
        }

        let mut rows = self.rows.lock();
        let new_value = update.value().map(str::to_string);

        match rows.get_mut(&record.business_key) {
            None => {
                let mut row = StoredRecord::pending(&record.filename);
                let (value, status) = row.columns_mut(update.artifact());
                *value = new_value;
                *status = update.status();
                rows.insert(record.business_key.clone(), row);
                Ok(1)
            }
            Some(row) => {
                let (value, status) = row.columns_mut(update.artifact());
                if *value == new_value && *status == update.status() {
                    return Ok(0);
                }
                *value = new_value;
                *status = update.status();
                Ok(1)
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), (Bytes, String)>>,
    fetches: Mutex<usize>,
    puts: Mutex<usize>,
    fail_fetches: Mutex<bool>,
    fail_puts: Mutex<bool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as a put
    pub fn insert(&self, container: &str, key: &str, body: impl Into<Bytes>) {
        self.objects.lock().insert(
            (container.to_string(), key.to_string()),
            (body.into(), "application/octet-stream".to_string()),
        );
    }

    pub fn get(&self, container: &str, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .get(&(container.to_string(), key.to_string()))
            .map(|(body, _)| body.clone())
    }

    pub fn content_type(&self, container: &str, key: &str) -> Option<String> {
        self.objects
            .lock()
            .get(&(container.to_string(), key.to_string()))
            .map(|(_, ct)| ct.clone())
    }

    pub fn fail_fetches(&self, fail: bool) {
        *self.fail_fetches.lock() = fail;
    }

    pub fn fail_puts(&self, fail: bool) {
        *self.fail_puts.lock() = fail;
    }

    pub fn fetch_calls(&self) -> usize {
        *self.fetches.lock()
    }

    pub fn put_calls(&self) -> usize {
        *self.puts.lock()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch(&self, container: &str, key: &str) -> Result<Bytes> {
        *self.fetches.lock() += 1;

        if *self.fail_fetches.lock() {
            return Err(PipelineError::object_store(
                codes::S3_DOWNLOAD_FAILED,
                format!("Failed to download s3://{container}/{key}"),
                io::Error::new(io::ErrorKind::TimedOut, "request timed out"),
            ));
        }

        self.get(container, key).ok_or_else(|| {
            PipelineError::object_store(
                codes::S3_DOWNLOAD_FAILED,
                format!("Failed to download s3://{container}/{key}"),
                io::Error::new(io::ErrorKind::NotFound, "NoSuchKey"),
            )
        })
    }

    async fn put(&self, container: &str, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        *self.puts.lock() += 1;

        if *self.fail_puts.lock() {
            return Err(PipelineError::object_store(
                codes::S3_UPLOAD_FAILED,
                format!("Failed to upload s3://{container}/{key}"),
                io::Error::new(io::ErrorKind::PermissionDenied, "AccessDenied"),
            ));
        }

        self.objects.lock().insert(
            (container.to_string(), key.to_string()),
            (body, content_type.to_string()),
        );
        Ok(())
    }
}
