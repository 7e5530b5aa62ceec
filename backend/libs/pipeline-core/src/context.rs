//! Per-invocation logging context
//!
//! One `InvocationContext` is created when an event arrives and dropped when
//! the handler returns. Everything logged while handling that event runs
//! inside its span, so each record carries the correlation id.

use std::time::{Duration, Instant};
use tracing::Span;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct InvocationContext {
    request_id: String,
    consumer: &'static str,
    started_at: Instant,
    span: Span,
}

impl InvocationContext {
    /// Create a context with a fresh random correlation id
    pub fn new(consumer: &'static str) -> Self {
        Self::with_request_id(consumer, Uuid::new_v4().to_string())
    }

    /// Create a context for a correlation id supplied by the invoking runtime
    pub fn with_request_id(consumer: &'static str, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let span = tracing::info_span!(
            "invocation",
            request_id = %request_id,
            consumer = consumer,
        );

        Self {
            request_id,
            consumer,
            started_at: Instant::now(),
            span,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn consumer(&self) -> &'static str {
        self.consumer
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
