//! Event dispatcher
//!
//! Drives one invocation end to end: decode the trigger, skip derived
//! artifacts, run the consumer's processing stage, then record the outcome in
//! the status store no matter how processing ended.

use crate::config::DerivedPrefix;
use crate::context::InvocationContext;
use crate::error::{codes, PipelineError, Result};
use crate::event::{decode_event, SourceObject};
use crate::response::{HandlerResponse, SkipReason};
use crate::status::{ArtifactKind, RecordKey, StatusUpdate};
use crate::store::StatusStore;
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// Result of a successful processing stage
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactOutput {
    /// Value stored in the artifact's value column (thumbnail key or caption)
    pub value: String,
    /// Extra fields merged into the success response
    pub details: Map<String, Value>,
}

impl ArtifactOutput {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.details.insert(field.to_string(), value.into());
        self
    }
}

/// Fetch, transform and persist stage of one consumer
#[async_trait]
pub trait ArtifactPipeline: Send + Sync {
    /// Artifact whose columns this consumer owns
    fn artifact(&self) -> ArtifactKind;

    async fn process(&self, ctx: &InvocationContext, source: &SourceObject)
        -> Result<ArtifactOutput>;
}

/// Per-consumer event handler
pub struct Dispatcher<P> {
    pipeline: P,
    status_store: Arc<dyn StatusStore>,
    derived_prefix: DerivedPrefix,
}

impl<P: ArtifactPipeline> Dispatcher<P> {
    pub fn new(
        pipeline: P,
        status_store: Arc<dyn StatusStore>,
        derived_prefix: DerivedPrefix,
    ) -> Self {
        Self {
            pipeline,
            status_store,
            derived_prefix,
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Handle one trigger event.
    ///
    /// Returns a success or skipped response, or the primary error. The status
    /// upsert has already run by the time a processing error is returned.
    pub async fn handle(&self, event: &Value, ctx: &InvocationContext) -> Result<HandlerResponse> {
        let span = ctx.span().clone();
        self.handle_in_span(event, ctx).instrument(span).await
    }

    async fn handle_in_span(
        &self,
        event: &Value,
        ctx: &InvocationContext,
    ) -> Result<HandlerResponse> {
        let artifact = self.pipeline.artifact();
        info!(artifact = %artifact, "Handling trigger event");

        let (source, shape) = decode_event(event).map_err(|e| {
            error!(error = %e, "Rejecting trigger event");
            e
        })?;
        debug!(?shape, bucket = %source.container, key = %source.key, "Decoded trigger event");

        if self.derived_prefix.matches(&source.key) {
            info!(
                key = %source.key,
                prefix = self.derived_prefix.as_str(),
                "Skipping derived artifact"
            );
            return Ok(HandlerResponse::Skipped {
                business_key: source.key,
                reason: SkipReason::DerivedArtifact,
            });
        }

        let processing = self.run_pipeline(ctx, &source).await;

        let update = match &processing {
            Ok(output) => StatusUpdate::completed(artifact, output.value.clone()),
            Err(e) => {
                error!(
                    error = %e,
                    code = e.code(),
                    transient = e.is_transient(),
                    key = %source.key,
                    "Processing failed"
                );
                StatusUpdate::failed(artifact, Some(e.failure_note()))
            }
        };

        let record = RecordKey::from(&source);
        let write = self.status_store.upsert(&record, &update).await;
        match &write {
            Ok(0) => warn!(
                key = %record.business_key,
                status = %update.status(),
                "Status upsert affected no rows"
            ),
            Ok(rows) => debug!(
                key = %record.business_key,
                rows,
                status = %update.status(),
                "Status recorded"
            ),
            Err(_) => {}
        }

        let output = resolve_outcome(processing, write)?;

        info!(
            key = %source.key,
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "Invocation completed"
        );

        let mut details = output.details;
        details.insert(artifact.value_column().to_string(), Value::String(output.value));
        Ok(HandlerResponse::Success {
            business_key: source.key,
            artifact,
            details,
        })
    }

    async fn run_pipeline(
        &self,
        ctx: &InvocationContext,
        source: &SourceObject,
    ) -> Result<ArtifactOutput> {
        match AssertUnwindSafe(self.pipeline.process(ctx, source))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(PipelineError::internal(
                codes::PROCESSING_UNEXPECTED_ERROR,
                format!("Processing panicked: {}", panic_message(panic.as_ref())),
            )),
        }
    }
}

/// Pick the error to re-signal.
///
/// A processing error always wins; the status write error only surfaces when
/// processing succeeded. The losing error is logged.
pub fn resolve_outcome<T>(processing: Result<T>, write: Result<u64>) -> Result<T> {
    match (processing, write) {
        (Ok(value), Ok(_)) => Ok(value),
        (Ok(_), Err(write_err)) => {
            error!(
                error = %write_err,
                code = write_err.code(),
                "Status upsert failed after successful processing"
            );
            Err(write_err)
        }
        (Err(processing_err), Ok(_)) => Err(processing_err),
        (Err(processing_err), Err(write_err)) => {
            error!(
                error = %write_err,
                code = write_err.code(),
                primary = processing_err.code(),
                "Status upsert also failed; keeping processing error"
            );
            Err(processing_err)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
