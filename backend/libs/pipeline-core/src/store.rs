//! Storage seams used by the dispatcher and the consumer pipelines
//!
//! Implementations must surface backend failures through the pipeline error
//! taxonomy and never swallow them.

use crate::config::ConfigFault;
use crate::error::Result;
use crate::status::{RecordKey, StatusUpdate};
use async_trait::async_trait;
use bytes::Bytes;

/// Blob store holding source uploads and derived thumbnails
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's full contents.
    ///
    /// Failures map to `ObjectStore(S3_DOWNLOAD_FAILED)`.
    async fn fetch(&self, container: &str, key: &str) -> Result<Bytes>;

    /// Store an object, replacing any existing one at the same key.
    ///
    /// Failures map to `ObjectStore(S3_UPLOAD_FAILED)`.
    async fn put(&self, container: &str, key: &str, body: Bytes, content_type: &str) -> Result<()>;
}

/// Record store holding per-image statuses
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Insert the record if absent, otherwise overwrite only the columns owned
    /// by `update.artifact()`.
    ///
    /// Returns the affected row count. Zero is not an error; it means the
    /// stored values were already identical.
    async fn upsert(&self, record: &RecordKey, update: &StatusUpdate) -> Result<u64>;
}

// A store whose configuration failed at startup answers every call with
// that failure.

#[async_trait]
impl ObjectStore for ConfigFault {
    async fn fetch(&self, _container: &str, _key: &str) -> Result<Bytes> {
        Err(self.to_error())
    }

    async fn put(
        &self,
        _container: &str,
        _key: &str,
        _body: Bytes,
        _content_type: &str,
    ) -> Result<()> {
        Err(self.to_error())
    }
}

#[async_trait]
impl StatusStore for ConfigFault {
    async fn upsert(&self, _record: &RecordKey, _update: &StatusUpdate) -> Result<u64> {
        Err(self.to_error())
    }
}
