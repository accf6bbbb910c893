//! Facial analysis: landmark extraction and face-region preprocessing.
//!
//! The landmark extractor locates a single usable face in a decoded image and
//! emits a fixed 68-point topology; the preprocessor turns the landmarked
//! region into the normalized tensor the visual classifier expects.

pub mod landmarks;
pub mod preprocess;

pub use landmarks::{DetectorConfig, LandmarkExtractor, LandmarkSet, NUM_LANDMARKS};
pub use preprocess::{FacePreprocessor, FACE_TENSOR_SIZE};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for structurally invalid image geometry
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("face crop degenerated to zero area after clamping")]
    DegenerateCrop,
}

/// Face bounding box in image pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Envelope of a point set, clipped to image bounds
    pub fn envelope(points: &[[f32; 2]], image_width: u32, image_height: u32) -> Self {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;

        for p in points {
            min_x = min_x.min(p[0]);
            min_y = min_y.min(p[1]);
            max_x = max_x.max(p[0]);
            max_y = max_y.max(p[1]);
        }

        let min_x = min_x.clamp(0.0, image_width as f32);
        let min_y = min_y.clamp(0.0, image_height as f32);
        let max_x = max_x.clamp(0.0, image_width as f32);
        let max_y = max_y.clamp(0.0, image_height as f32);

        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }
}
