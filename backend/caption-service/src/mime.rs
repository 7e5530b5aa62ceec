//! Content-type detection from magic bytes

use image::ImageFormat;
use tracing::{debug, warn};

/// Used when the bytes match no known image signature
pub const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

/// Detect the content type of `bytes`.
///
/// Never fails: unknown signatures fall back to `image/jpeg`.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    let format = match image::guess_format(bytes) {
        Ok(format) => format,
        Err(e) => {
            warn!(error = %e, fallback = FALLBACK_CONTENT_TYPE, "Could not detect content type");
            return FALLBACK_CONTENT_TYPE;
        }
    };

    let content_type = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Ico => "image/x-icon",
        ImageFormat::Avif => "image/avif",
        other => {
            warn!(format = ?other, fallback = FALLBACK_CONTENT_TYPE, "Unmapped image format");
            FALLBACK_CONTENT_TYPE
        }
    };

    debug!(content_type, "Detected content type");
    content_type
}
