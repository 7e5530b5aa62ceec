//! Dispatcher assembly for the thumbnail handler

use crate::config::{HandlerConfig, ThumbnailServiceConfig};
use crate::processor::ThumbnailProcessor;
use crate::service::ThumbnailPipeline;
use image_store::connect_status_store;
use pipeline_core::{Dispatcher, ObjectStore, StatusStore};
use s3_utils::connect_object_store;
use std::sync::Arc;

/// Wire the configured stores into a dispatcher.
///
/// Never fails: storage settings that did not load are carried as faults,
/// so derived keys are still skipped and real uploads are recorded as failed.
pub async fn build_dispatcher(config: HandlerConfig) -> Dispatcher<ThumbnailPipeline> {
    let statuses = connect_status_store(config.db, config.service.run_migrations).await;
    let objects = connect_object_store(config.s3).await;
    dispatcher(config.service, objects, statuses)
}

pub fn dispatcher(
    service: ThumbnailServiceConfig,
    objects: Arc<dyn ObjectStore>,
    statuses: Arc<dyn StatusStore>,
) -> Dispatcher<ThumbnailPipeline> {
    let pipeline = ThumbnailPipeline::new(
        objects,
        ThumbnailProcessor::new(service.thumbnail),
        service.derived_prefix.clone(),
        service.derived_bucket,
    );
    Dispatcher::new(pipeline, statuses, service.derived_prefix)
}
