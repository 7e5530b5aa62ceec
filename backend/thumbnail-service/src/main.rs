//! Thumbnail handler - runs one invocation for the trigger event on stdin
//!
//! Environment variables:
//! - DERIVED_PREFIX: key prefix for thumbnails (default: "thumbnails/")
//! - DERIVED_BUCKET: bucket receiving thumbnails (default: source bucket)
//! - TARGET_WIDTH / TARGET_HEIGHT: bounding box (default: 128x128)
//! - THUMBNAIL_QUALITY: JPEG quality 1-100 (default: 85)
//! - DATABASE_URL or DB_HOST / DB_USER / DB_PASSWORD / DB_NAME / DB_PORT
//! - AWS_REGION, S3_ENDPOINT, AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY
//! - RUN_MIGRATIONS: apply schema migrations first (default: false)
//! - INVOCATION_REQUEST_ID: correlation id (default: random UUID)

use pipeline_core::runner::{context_from_env, report_failure, run_once};
use pipeline_core::telemetry::init_tracing;
use std::process::ExitCode;
use thumbnail_service::{build_dispatcher, HandlerConfig, CONSUMER};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing("thumbnail_handler");

    let ctx = context_from_env(CONSUMER);

    let config = match HandlerConfig::from_env() {
        Ok(config) => config,
        Err(e) => return report_failure(&e, None).await,
    };
    info!(
        request_id = ctx.request_id(),
        prefix = config.service.derived_prefix.as_str(),
        target_width = config.service.thumbnail.target_width,
        target_height = config.service.thumbnail.target_height,
        "Configuration loaded"
    );

    let dispatcher = build_dispatcher(config).await;
    run_once(&dispatcher, &ctx).await
}
