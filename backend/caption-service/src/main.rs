//! Caption handler - runs one invocation for the trigger event on stdin
//!
//! Environment variables:
//! - INFERENCE_API_KEY: required; uploads are marked failed without it
//! - INFERENCE_MODEL_NAME (default: "gemini-1.5-flash-latest")
//! - INFERENCE_PROMPT (default: "Describe this image in detail.")
//! - INFERENCE_BASE_URL, INFERENCE_TIMEOUT_SECS (default: 60)
//! - DERIVED_PREFIX: keys under it are ignored (default: "thumbnails/")
//! - DATABASE_URL or DB_HOST / DB_USER / DB_PASSWORD / DB_NAME / DB_PORT
//! - AWS_REGION, S3_ENDPOINT, AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY
//! - RUN_MIGRATIONS: apply schema migrations first (default: false)

use caption_service::{build_dispatcher, HandlerConfig, CONSUMER};
use pipeline_core::runner::{context_from_env, report_failure, run_once};
use pipeline_core::telemetry::init_tracing;
use std::process::ExitCode;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing("caption_handler");

    let ctx = context_from_env(CONSUMER);

    let config = match HandlerConfig::from_env() {
        Ok(config) => config,
        Err(e) => return report_failure(&e, None).await,
    };
    if let Ok(inference) = &config.service.inference {
        info!(
            request_id = ctx.request_id(),
            model = %inference.model_name,
            timeout_secs = inference.timeout_secs,
            "Configuration loaded"
        );
    }

    let dispatcher = build_dispatcher(config).await;
    run_once(&dispatcher, &ctx).await
}
