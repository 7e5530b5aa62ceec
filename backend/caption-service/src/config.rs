//! Caption handler configuration, assembled once at process start

use image_store::DbConfig;
use pipeline_core::config::{non_blank, parse_or_default};
use pipeline_core::{codes, defer, Deferred, DerivedPrefix, PipelineError, Result};
use s3_utils::S3Config;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_MODEL_NAME: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_PROMPT: &str = "Describe this image in detail.";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct CaptionEnv {
    derived_prefix: Option<String>,
    inference_api_key: Option<String>,
    inference_model_name: Option<String>,
    inference_prompt: Option<String>,
    inference_base_url: Option<String>,
    inference_timeout_secs: Option<String>,
    run_migrations: Option<String>,
}

/// Inference API settings
#[derive(Clone)]
pub struct InferenceConfig {
    pub api_key: String,
    pub model_name: String,
    pub prompt: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_key", &"[REDACTED]")
            .field("model_name", &self.model_name)
            .field("prompt", &self.prompt)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl InferenceConfig {
    fn from_env_vars(env: &CaptionEnv) -> Result<Self> {
        let api_key = non_blank(env.inference_api_key.clone()).ok_or_else(|| {
            PipelineError::configuration(
                codes::INFERENCE_KEY_MISSING,
                "INFERENCE_API_KEY is not configured",
            )
        })?;

        Ok(Self {
            api_key,
            model_name: non_blank(env.inference_model_name.clone())
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            prompt: non_blank(env.inference_prompt.clone())
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            base_url: non_blank(env.inference_base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_secs: parse_or_default(
                "INFERENCE_TIMEOUT_SECS",
                env.inference_timeout_secs.as_deref(),
                DEFAULT_TIMEOUT_SECS,
                |t: &u64| *t > 0,
            ),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct CaptionServiceConfig {
    pub derived_prefix: DerivedPrefix,
    /// A missing API key fails captioning, not startup
    pub inference: Deferred<InferenceConfig>,
    /// Apply schema migrations before handling the event
    pub run_migrations: bool,
}

impl CaptionServiceConfig {
    fn from_env_vars(env: CaptionEnv) -> Result<Self> {
        let derived_prefix = match &env.derived_prefix {
            Some(raw) => DerivedPrefix::new(raw)?,
            None => DerivedPrefix::default(),
        };

        Ok(Self {
            derived_prefix,
            inference: defer(InferenceConfig::from_env_vars(&env)),
            run_migrations: parse_or_default(
                "RUN_MIGRATIONS",
                env.run_migrations.as_deref(),
                false,
                |_| true,
            ),
        })
    }

    /// Prompt sent with every image
    pub fn prompt(&self) -> &str {
        match &self.inference {
            Ok(inference) => &inference.prompt,
            Err(_) => DEFAULT_PROMPT,
        }
    }
}

/// Everything the caption handler needs.
///
/// Only the derived prefix is fatal. Settings for the object store, the
/// database and the model are kept as faults when they fail to load, so
/// derived keys are still skipped and uploads are recorded as failed.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub service: CaptionServiceConfig,
    pub s3: Deferred<S3Config>,
    pub db: Deferred<DbConfig>,
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self> {
        let env = envy::from_env::<CaptionEnv>().map_err(invalid_config)?;
        Ok(Self {
            service: CaptionServiceConfig::from_env_vars(env)?,
            s3: defer(S3Config::from_env()),
            db: defer(DbConfig::from_env()),
        })
    }

    pub fn from_vars(vars: &[(String, String)]) -> Result<Self> {
        let env = envy::from_iter::<_, CaptionEnv>(vars.iter().cloned())
            .map_err(invalid_config)?;
        Ok(Self {
            service: CaptionServiceConfig::from_env_vars(env)?,
            s3: defer(S3Config::from_vars(vars.iter().cloned())),
            db: defer(DbConfig::from_vars(vars.iter().cloned())),
        })
    }
}

fn invalid_config(e: envy::Error) -> PipelineError {
    PipelineError::configuration(
        codes::INVALID_CONFIG,
        format!("Invalid configuration: {e}"),
    )
}
