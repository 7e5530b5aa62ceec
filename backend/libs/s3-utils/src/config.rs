//! S3 connection settings shared by both consumers

use pipeline_core::config::non_blank;
use pipeline_core::{codes, PipelineError, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Clone, Deserialize)]
pub struct S3Config {
    /// AWS region
    #[serde(rename = "aws_region", default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible storage (MinIO, LocalStack)
    #[serde(rename = "s3_endpoint", default)]
    pub endpoint: Option<String>,
    /// Static credentials; the default provider chain is used when unset
    #[serde(rename = "aws_access_key_id", default)]
    pub access_key_id: Option<String>,
    #[serde(rename = "aws_secret_access_key", default)]
    pub secret_access_key: Option<String>,
    #[serde(rename = "s3_connect_timeout_secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(rename = "s3_operation_timeout_secs", default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_operation_timeout_secs() -> u64 {
    30
}

impl S3Config {
    /// Load from process environment
    pub fn from_env() -> Result<Self> {
        Self::normalise(envy::from_env::<Self>())
    }

    /// Load from explicit key/value pairs
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::normalise(envy::from_iter::<_, Self>(vars))
    }

    fn normalise(parsed: std::result::Result<Self, envy::Error>) -> Result<Self> {
        let mut config = parsed.map_err(|e| {
            PipelineError::configuration(
                codes::INVALID_CONFIG,
                format!("Invalid S3 configuration: {e}"),
            )
        })?;
        config.endpoint = non_blank(config.endpoint);
        config.access_key_id = non_blank(config.access_key_id);
        config.secret_access_key = non_blank(config.secret_access_key);
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Static credentials, only when both halves are present
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .finish()
    }
}
