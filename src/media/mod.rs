//! Media decoding: encoded byte payloads to raw sample buffers.
//!
//! Images decode to an RGB pixel grid, audio decodes to a mono f32 sample
//! sequence at the fixed 16 kHz pipeline rate. Both are pure transforms.

mod audio;
mod image;

pub use self::audio::{decode_audio, AudioClip, TARGET_SAMPLE_RATE};
pub use self::image::decode_image;

use ::image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while decoding a media payload
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty media payload")]
    EmptyPayload,

    #[error("failed to decode image: {0}")]
    MalformedImage(String),

    #[error("failed to decode audio: {0}")]
    MalformedAudio(String),

    #[error("unsupported media format: {0}")]
    UnsupportedFormat(String),

    #[error("resampling failed: {0}")]
    Resample(String),
}

/// Declared kind of an encoded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
}

/// A decoded media payload
#[derive(Debug, Clone)]
pub enum DecodedMedia {
    Image(RgbImage),
    Audio(AudioClip),
}

/// Decode an encoded byte payload according to its declared kind
pub fn decode(bytes: &[u8], kind: MediaKind) -> Result<DecodedMedia, DecodeError> {
    match kind {
        MediaKind::Image => decode_image(bytes).map(DecodedMedia::Image),
        MediaKind::Audio => decode_audio(bytes).map(DecodedMedia::Audio),
    }
}
