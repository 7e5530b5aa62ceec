//! Status model for derived artifacts
//!
//! Each source image has two independent state machines, one per derived
//! artifact. A `StatusUpdate` only ever names the columns owned by its
//! artifact, so the two consumers never write each other's columns.

use crate::error::{codes, PipelineError, Result};
use crate::event::SourceObject;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Derived artifact produced by a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Thumbnail,
    Caption,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Thumbnail => "thumbnail",
            ArtifactKind::Caption => "caption",
        }
    }

    /// Column holding the artifact value
    pub fn value_column(&self) -> &'static str {
        match self {
            ArtifactKind::Thumbnail => "thumbnail_ref",
            ArtifactKind::Caption => "caption_text",
        }
    }

    /// Column holding the artifact status
    pub fn status_column(&self) -> &'static str {
        match self {
            ArtifactKind::Thumbnail => "thumbnail_status",
            ArtifactKind::Caption => "caption_status",
        }
    }

    /// Whether a failed status may carry a diagnostic note in the value column
    fn keeps_failure_note(&self) -> bool {
        matches!(self, ArtifactKind::Caption)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of one derived artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessingStatus::Pending)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(PipelineError::invalid_input(
                codes::INVALID_STATUS,
                format!("Invalid status '{other}'"),
            )),
        }
    }
}

/// Identity of the record a status write targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    /// Source object key; unique across the table
    pub business_key: String,
    /// Display name, written only when the row is first created
    pub filename: String,
}

impl RecordKey {
    pub fn new(business_key: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            business_key: business_key.into(),
            filename: filename.into(),
        }
    }
}

impl From<&SourceObject> for RecordKey {
    fn from(source: &SourceObject) -> Self {
        RecordKey::new(source.key.clone(), source.filename())
    }
}

/// Terminal status write for one artifact
///
/// Construction enforces the column invariants: `completed` always carries a
/// value, and a failed thumbnail never carries a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    artifact: ArtifactKind,
    status: ProcessingStatus,
    value: Option<String>,
}

impl StatusUpdate {
    pub fn completed(artifact: ArtifactKind, value: impl Into<String>) -> Self {
        Self {
            artifact,
            status: ProcessingStatus::Completed,
            value: Some(value.into()),
        }
    }

    /// Failed write; `note` is kept only for artifacts whose value column can
    /// hold a diagnostic (captions)
    pub fn failed(artifact: ArtifactKind, note: Option<String>) -> Self {
        let value = if artifact.keeps_failure_note() { note } else { None };
        Self {
            artifact,
            status: ProcessingStatus::Failed,
            value,
        }
    }

    /// Build an update from loose parts, rejecting non-terminal statuses
    pub fn new(
        artifact: ArtifactKind,
        status: ProcessingStatus,
        value: Option<String>,
    ) -> Result<Self> {
        match (status, value) {
            (ProcessingStatus::Completed, Some(v)) => Ok(Self::completed(artifact, v)),
            (ProcessingStatus::Completed, None) => Err(PipelineError::invalid_input(
                codes::INVALID_STATUS,
                format!("Status 'completed' for {artifact} requires a value"),
            )),
            (ProcessingStatus::Failed, note) => Ok(Self::failed(artifact, note)),
            (ProcessingStatus::Pending, _) => Err(PipelineError::invalid_input(
                codes::INVALID_STATUS,
                "Invalid status 'pending': status writes must be 'completed' or 'failed'",
            )),
        }
    }

    pub fn artifact(&self) -> ArtifactKind {
        self.artifact
    }

    pub fn status(&self) -> ProcessingStatus {
        self.status
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}
