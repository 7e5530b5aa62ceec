//! Caption consumer for the image pipeline
//!
//! Asks a multimodal model to describe each uploaded image and records
//! the caption in the shared `images` table.

pub mod config;
pub mod gemini;
pub mod handler;
pub mod mime;
pub mod pipeline;

pub use config::{CaptionServiceConfig, HandlerConfig, InferenceConfig};
pub use gemini::{GeminiClient, InferenceBackend};
pub use handler::{build_dispatcher, dispatcher, inference_backend};
pub use mime::sniff_content_type;
pub use pipeline::CaptionPipeline;

/// Consumer name attached to every log record
pub const CONSUMER: &str = "caption";
