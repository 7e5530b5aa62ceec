//! Error taxonomy for the image pipeline
//!
//! Every failure a consumer can re-signal to its invoking runtime is one of the
//! variants below. Each carries a stable machine-readable `code` and, where a
//! lower-level error caused it, that error as `source()`.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Boxed cause kept for diagnostics
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error codes shared by both consumers
pub mod codes {
    pub const UNKNOWN_EVENT_STRUCTURE: &str = "UNKNOWN_EVENT_STRUCTURE";
    pub const INVALID_EVENT_JSON: &str = "INVALID_EVENT_JSON";
    pub const INVALID_STATUS: &str = "INVALID_STATUS";
    pub const INVALID_EXPIRATION: &str = "INVALID_EXPIRATION";

    pub const DB_CONFIG_MISSING: &str = "DB_CONFIG_MISSING";
    pub const INFERENCE_KEY_MISSING: &str = "INFERENCE_KEY_MISSING";
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";

    pub const S3_DOWNLOAD_FAILED: &str = "S3_DOWNLOAD_FAILED";
    pub const S3_UPLOAD_FAILED: &str = "S3_UPLOAD_FAILED";
    pub const S3_PRESIGN_FAILED: &str = "S3_PRESIGN_FAILED";
    pub const S3_HEALTH_CHECK_FAILED: &str = "S3_HEALTH_CHECK_FAILED";

    pub const INVALID_IMAGE_FORMAT: &str = "INVALID_IMAGE_FORMAT";
    pub const IMAGE_PROCESSING_ERROR: &str = "IMAGE_PROCESSING_ERROR";
    pub const EMPTY_IMAGE_DATA: &str = "EMPTY_IMAGE_DATA";
    pub const CONTENT_BLOCKED: &str = "CONTENT_BLOCKED";
    pub const EMPTY_RESPONSE: &str = "EMPTY_RESPONSE";
    pub const INFERENCE_API_ERROR: &str = "INFERENCE_API_ERROR";

    pub const DB_CONNECTION_FAILED: &str = "DB_CONNECTION_FAILED";
    pub const DB_UPSERT_FAILED: &str = "DB_UPSERT_FAILED";
    pub const DB_QUERY_FAILED: &str = "DB_QUERY_FAILED";
    pub const DB_MIGRATION_FAILED: &str = "DB_MIGRATION_FAILED";

    pub const PROCESSING_UNEXPECTED_ERROR: &str = "PROCESSING_UNEXPECTED_ERROR";
    pub const TASK_PANICKED: &str = "TASK_PANICKED";
    pub const UNCLASSIFIED: &str = "UNCLASSIFIED";
}

/// The closed set of failure kinds the invoking runtime can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidInput,
    Configuration,
    ObjectStore,
    Transform,
    StatusStore,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::ObjectStore => "ObjectStoreError",
            ErrorKind::Transform => "TransformError",
            ErrorKind::StatusStore => "StatusStoreError",
            ErrorKind::Internal => "InternalError",
        }
    }

    /// Human-readable label used as the prefix of stored failure notes
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "Invalid input",
            ErrorKind::Configuration => "Configuration error",
            ErrorKind::ObjectStore => "Object store error",
            ErrorKind::Transform => "Transform error",
            ErrorKind::StatusStore => "Status store error",
            ErrorKind::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline error
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {message} (code: {code})")]
    InvalidInput { code: &'static str, message: String },

    #[error("Configuration error: {message} (code: {code})")]
    Configuration { code: &'static str, message: String },

    #[error("Object store error: {message} (code: {code})")]
    ObjectStore {
        code: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Transform error: {message} (code: {code})")]
    Transform {
        code: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Status store error: {message} (code: {code})")]
    StatusStore {
        code: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Internal error: {message} (code: {code})")]
    Internal {
        code: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl PipelineError {
    pub fn invalid_input(code: &'static str, message: impl Into<String>) -> Self {
        PipelineError::InvalidInput {
            code,
            message: message.into(),
        }
    }

    pub fn configuration(code: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Configuration {
            code,
            message: message.into(),
        }
    }

    pub fn object_store(
        code: &'static str,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        PipelineError::ObjectStore {
            code,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn transform(code: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Transform {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn transform_with_source(
        code: &'static str,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        PipelineError::Transform {
            code,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn status_store(
        code: &'static str,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        PipelineError::StatusStore {
            code,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Internal {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidInput { .. } => ErrorKind::InvalidInput,
            PipelineError::Configuration { .. } => ErrorKind::Configuration,
            PipelineError::ObjectStore { .. } => ErrorKind::ObjectStore,
            PipelineError::Transform { .. } => ErrorKind::Transform,
            PipelineError::StatusStore { .. } => ErrorKind::StatusStore,
            PipelineError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput { code, .. }
            | PipelineError::Configuration { code, .. }
            | PipelineError::ObjectStore { code, .. }
            | PipelineError::Transform { code, .. }
            | PipelineError::StatusStore { code, .. }
            | PipelineError::Internal { code, .. } => code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PipelineError::InvalidInput { message, .. }
            | PipelineError::Configuration { message, .. }
            | PipelineError::ObjectStore { message, .. }
            | PipelineError::Transform { message, .. }
            | PipelineError::StatusStore { message, .. }
            | PipelineError::Internal { message, .. } => message,
        }
    }

    /// Short note suitable for persisting next to a failed status
    pub fn failure_note(&self) -> String {
        format!("{}: {}", self.kind().label(), self.message())
    }

    /// Check if a retry of the same event could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::ObjectStore { .. } | PipelineError::StatusStore { .. } => true,
            PipelineError::Transform { code, .. } => *code == codes::INFERENCE_API_ERROR,
            _ => false,
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Internal {
            code: codes::UNCLASSIFIED,
            message: err.to_string(),
            source: Some(err.into()),
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Internal {
            code: codes::TASK_PANICKED,
            message: format!("Worker task failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}
