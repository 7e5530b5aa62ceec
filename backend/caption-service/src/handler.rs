//! Dispatcher assembly for the caption handler

use crate::config::{CaptionServiceConfig, HandlerConfig};
use crate::gemini::{GeminiClient, InferenceBackend};
use crate::pipeline::CaptionPipeline;
use image_store::connect_status_store;
use pipeline_core::{defer, Dispatcher, ObjectStore, StatusStore};
use s3_utils::connect_object_store;
use std::sync::Arc;

/// Wire the configured stores and model client into a dispatcher.
///
/// Never fails: settings that did not load are carried as faults, so
/// derived keys are still skipped and real uploads are recorded as failed.
pub async fn build_dispatcher(config: HandlerConfig) -> Dispatcher<CaptionPipeline> {
    let statuses = connect_status_store(config.db, config.service.run_migrations).await;
    let objects = connect_object_store(config.s3).await;
    let backend = inference_backend(&config.service);
    dispatcher(config.service, objects, backend, statuses)
}

/// The Gemini client, or the fault that prevented building it
pub fn inference_backend(service: &CaptionServiceConfig) -> Arc<dyn InferenceBackend> {
    let client = service
        .inference
        .clone()
        .and_then(|inference| defer(GeminiClient::new(&inference)));

    match client {
        Ok(client) => Arc::new(client),
        Err(fault) => Arc::new(fault),
    }
}

pub fn dispatcher(
    service: CaptionServiceConfig,
    objects: Arc<dyn ObjectStore>,
    backend: Arc<dyn InferenceBackend>,
    statuses: Arc<dyn StatusStore>,
) -> Dispatcher<CaptionPipeline> {
    let pipeline = CaptionPipeline::new(objects, backend, service.prompt());
    Dispatcher::new(pipeline, statuses, service.derived_prefix)
}
