//! Configuration pieces shared by both consumers
//!
//! Service configs are assembled once at process start. Helpers here keep the
//! fallback rules identical across services.

use crate::error::{codes, PipelineError, Result};
use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_DERIVED_PREFIX: &str = "thumbnails/";

/// Key prefix under which derived artifacts are written.
///
/// Keys are matched against the prefix exactly as configured, so `thumb_`
/// also covers `thumb_a.jpg`. Derived keys are built under the prefix with a
/// `/` separator added when missing; they always start with the raw prefix
/// and are therefore skipped when they trigger the pipeline again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedPrefix(String);

impl DerivedPrefix {
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return Err(PipelineError::configuration(
                codes::INVALID_CONFIG,
                "DERIVED_PREFIX must not be empty: every object would be treated as a \
                 derived artifact",
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `key` points at an object this pipeline wrote itself
    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.0)
    }

    /// Build a key under this prefix
    pub fn join(&self, name: &str) -> String {
        if self.0.ends_with('/') {
            format!("{}{}", self.0, name)
        } else {
            format!("{}/{}", self.0, name)
        }
    }
}

impl Default for DerivedPrefix {
    fn default() -> Self {
        Self(DEFAULT_DERIVED_PREFIX.to_string())
    }
}

/// Setting that may have failed validation at startup
pub type Deferred<T> = std::result::Result<T, ConfigFault>;

/// Configuration failure kept until an event needs the setting.
///
/// Only an invalid derived prefix aborts startup. Other settings that fail
/// are captured here so derived objects are still skipped and real uploads
/// still get a failed status row carrying the configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFault {
    code: &'static str,
    message: String,
}

impl ConfigFault {
    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The `Configuration` error reported for each event that needs the setting
    pub fn to_error(&self) -> PipelineError {
        PipelineError::configuration(self.code, self.message.clone())
    }
}

impl From<PipelineError> for ConfigFault {
    fn from(err: PipelineError) -> Self {
        Self {
            code: err.code(),
            message: err.message().to_string(),
        }
    }
}

/// Keep a failed setting for later instead of aborting startup
pub fn defer<T>(setting: Result<T>) -> Deferred<T> {
    setting.map_err(|e| {
        warn!(
            code = e.code(),
            error = %e,
            "Configuration invalid; affected events will be recorded as failed"
        );
        ConfigFault::from(e)
    })
}

/// Parse an optional setting, falling back to `default` with a warning when
/// the value is missing, unparsable or rejected by `valid`.
pub fn parse_or_default<T>(
    name: &str,
    raw: Option<&str>,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> T
where
    T: FromStr + Display + Copy,
{
    let Some(raw) = raw else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            warn!(
                setting = name,
                value = raw,
                default = %default,
                "Invalid configuration value, using default"
            );
            default
        }
    }
}

/// Treat blank strings as unset
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
