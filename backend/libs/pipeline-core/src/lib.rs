//! Shared core of the image pipeline consumers
//!
//! Provides:
//! - Trigger event decoding for both notification shapes
//! - The closed `PipelineError` taxonomy
//! - Status model and the `ObjectStore` / `StatusStore` seams
//! - The `Dispatcher` that runs a consumer pipeline and always reconciles status
//! - Tracing setup and per-invocation context

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod response;
pub mod runner;
pub mod status;
pub mod store;
pub mod telemetry;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{defer, ConfigFault, Deferred, DerivedPrefix};
pub use context::InvocationContext;
pub use dispatcher::{resolve_outcome, ArtifactOutput, ArtifactPipeline, Dispatcher};
pub use error::{codes, ErrorKind, PipelineError, Result};
pub use event::{decode_event, parse_event, EventShape, SourceObject};
pub use response::{HandlerResponse, SkipReason};
pub use status::{ArtifactKind, ProcessingStatus, RecordKey, StatusUpdate};
pub use store::{ObjectStore, StatusStore};
