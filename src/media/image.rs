//! Still image decoding.

use super::DecodeError;
use image::RgbImage;
use tracing::debug;

/// Decode an encoded image payload (PNG or JPEG) to an RGB pixel grid
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| DecodeError::MalformedImage(e.to_string()))?;

    let rgb = decoded.to_rgb8();
    debug!("Decoded image: {}x{}", rgb.width(), rgb.height());

    Ok(rgb)
}
