//! Thumbnail processor - generates thumbnails from uploaded images
//!
//! Decodes the image, flattens any transparency onto white, shrinks it to fit
//! the target box while keeping the aspect ratio, and encodes it as JPEG.
//!
//! Uses `spawn_blocking` for CPU-intensive operations to avoid blocking the async runtime.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, GenericImageView, ImageError, RgbImage, Rgba, RgbaImage};
use pipeline_core::{codes, PipelineError, Result};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_TARGET_WIDTH: u32 = 128;
pub const DEFAULT_TARGET_HEIGHT: u32 = 128;
pub const DEFAULT_QUALITY: u8 = 85;

/// Content type of every generated thumbnail
pub const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

/// Configuration for thumbnail generation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThumbnailConfig {
    /// Bounding box width in pixels
    pub target_width: u32,
    /// Bounding box height in pixels
    pub target_height: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            target_height: DEFAULT_TARGET_HEIGHT,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Result of thumbnail generation
#[derive(Debug)]
pub struct ThumbnailResult {
    /// The thumbnail image data as JPEG
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Thumbnail processor
pub struct ThumbnailProcessor {
    config: ThumbnailConfig,
}

impl ThumbnailProcessor {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ThumbnailConfig::default())
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Generate a thumbnail from the given image data (blocking version)
    ///
    /// **Note:** This method performs CPU-intensive operations and should not be called
    /// directly from async code. Use `generate_async` instead.
    pub fn generate(&self, original_data: &[u8]) -> Result<ThumbnailResult> {
        let img = image::load_from_memory(original_data).map_err(classify_decode_error)?;

        let (orig_w, orig_h) = img.dimensions();
        debug!(
            original_width = orig_w,
            original_height = orig_h,
            has_alpha = img.color().has_alpha(),
            "Processing image for thumbnail"
        );

        let rgb = flatten_to_rgb(img);
        let (new_w, new_h) = self.calculate_dimensions(orig_w, orig_h);

        let resized = if (new_w, new_h) == (orig_w, orig_h) {
            debug!("Image already within target box, encoding as-is");
            rgb
        } else {
            imageops::resize(&rgb, new_w, new_h, FilterType::Lanczos3)
        };

        let data = self.encode_jpeg(&resized)?;

        debug!(
            width = new_w,
            height = new_h,
            size = data.len(),
            "Thumbnail generated"
        );

        Ok(ThumbnailResult {
            data,
            width: new_w,
            height: new_h,
        })
    }

    /// Generate a thumbnail on the blocking thread pool
    pub async fn generate_async(self: Arc<Self>, original_data: Bytes) -> Result<ThumbnailResult> {
        tokio::task::spawn_blocking(move || self.generate(&original_data)).await?
    }

    /// Fit `width` x `height` inside the target box, keeping the aspect ratio.
    ///
    /// Never upscales; each side is at least 1 px.
    fn calculate_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let (box_w, box_h) = (self.config.target_width, self.config.target_height);
        if width <= box_w && height <= box_h {
            return (width, height);
        }

        let ratio = f64::min(box_w as f64 / width as f64, box_h as f64 / height as f64);
        let fit = |side: u32, limit: u32| ((side as f64 * ratio).round() as u32).clamp(1, limit);
        (fit(width, box_w), fit(height, box_h))
    }

    fn encode_jpeg(&self, img: &RgbImage) -> Result<Bytes> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.config.quality)
            .encode(img.as_raw(), img.width(), img.height(), ColorType::Rgb8)
            .map_err(|e| {
                PipelineError::transform_with_source(
                    codes::IMAGE_PROCESSING_ERROR,
                    format!("Failed to encode JPEG: {e}"),
                    e,
                )
            })?;

        Ok(Bytes::from(buf))
    }
}

/// Composite transparent images onto opaque white, otherwise convert to RGB
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }

    let top = img.into_rgba8();
    let mut background =
        RgbaImage::from_pixel(top.width(), top.height(), Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut background, &top, 0, 0);
    DynamicImage::ImageRgba8(background).into_rgb8()
}

// Decoding reads from memory, so an I/O error here means a truncated stream.
fn classify_decode_error(err: ImageError) -> PipelineError {
    match err {
        ImageError::Decoding(_) | ImageError::Unsupported(_) | ImageError::IoError(_) => {
            PipelineError::transform_with_source(
                codes::INVALID_IMAGE_FORMAT,
                format!("Source is not a decodable image: {err}"),
                err,
            )
        }
        other => PipelineError::transform_with_source(
            codes::IMAGE_PROCESSING_ERROR,
            format!("Failed to process image: {other}"),
            other,
        ),
    }
}
