//! Thumbnail consumer for the image pipeline
//!
//! Generates a JPEG thumbnail for each uploaded image and records the
//! outcome in the shared `images` table.

pub mod config;
pub mod handler;
pub mod processor;
pub mod service;

pub use config::{HandlerConfig, ThumbnailServiceConfig};
pub use handler::{build_dispatcher, dispatcher};
pub use processor::{ThumbnailConfig, ThumbnailProcessor, ThumbnailResult};
pub use service::{thumbnail_key, ThumbnailPipeline};

/// Consumer name attached to every log record
pub const CONSUMER: &str = "thumbnail";
