//! Handler response payloads

use crate::error::PipelineError;
use crate::status::ArtifactKind;
use serde::Serialize;
use serde_json::{Map, Value};

/// Why an event was acknowledged without processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The object is itself a derived artifact written by this pipeline
    DerivedArtifact,
}

/// Structured result returned to the invoking runtime
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HandlerResponse {
    Success {
        business_key: String,
        artifact: ArtifactKind,
        #[serde(flatten)]
        details: Map<String, Value>,
    },
    Skipped {
        business_key: String,
        reason: SkipReason,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        business_key: Option<String>,
        error_type: &'static str,
        error_code: &'static str,
        message: String,
    },
}

impl HandlerResponse {
    /// Describe a re-signalled error for runtimes that capture output
    pub fn from_error(err: &PipelineError, business_key: Option<&str>) -> Self {
        HandlerResponse::Error {
            business_key: business_key.map(str::to_string),
            error_type: err.kind().as_str(),
            error_code: err.code(),
            message: err.message().to_string(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            HandlerResponse::Success { .. } => "success",
            HandlerResponse::Skipped { .. } => "skipped",
            HandlerResponse::Error { .. } => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, HandlerResponse::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, HandlerResponse::Skipped { .. })
    }

    /// Look up a detail field of a success payload
    pub fn detail(&self, field: &str) -> Option<&Value> {
        match self {
            HandlerResponse::Success { details, .. } => details.get(field),
            _ => None,
        }
    }
}
