//! Modality embedding generation for the fusion path.
//!
//! Embedding generation is an explicit collaborator seam: implementations
//! must produce fixed-size summary vectors matching the fusion classifier's
//! input contract. The built-in [`SummaryEncoder`] derives deterministic
//! grid and band statistics from the real face and spectrogram tensors.

use super::AUDIO_EMBED_DIM;
use crate::acoustic::AcousticFeatureVector;
use crate::face::FACE_TENSOR_SIZE;
use ndarray::{Array2, Axis};

/// Produces fixed-size modality summary vectors for fusion.
///
/// `encode_visual` must return [`VISUAL_EMBED_DIM`] values and `encode_audio`
/// [`AUDIO_EMBED_DIM`] values.
pub trait ModalityEncoder: Send + Sync {
    fn encode_visual(&self, face: &Array2<f32>) -> Vec<f32>;

    fn encode_audio(
        &self,
        spectrogram: &Array2<f32>,
        features: &AcousticFeatureVector,
    ) -> Vec<f32>;
}

/// Grid cells per axis over the face tensor
const VISUAL_GRID: usize = 16;

/// Default encoder: pooled statistics over the input tensors.
///
/// Visual: per-cell mean and standard deviation over a 16x16 grid of the
/// face tensor (512 values). Audio: per-band mean of the normalized mel
/// spectrogram over the time axis (128 values).
pub struct SummaryEncoder;

impl ModalityEncoder for SummaryEncoder {
    fn encode_visual(&self, face: &Array2<f32>) -> Vec<f32> {
        let cell = FACE_TENSOR_SIZE / VISUAL_GRID;
        let mut means = Vec::with_capacity(VISUAL_GRID * VISUAL_GRID);
        let mut stds = Vec::with_capacity(VISUAL_GRID * VISUAL_GRID);

        for gy in 0..VISUAL_GRID {
            for gx in 0..VISUAL_GRID {
                let mut sum = 0.0f32;
                let mut sum_sq = 0.0f32;
                let mut count = 0usize;
                for y in gy * cell..((gy + 1) * cell).min(face.nrows()) {
                    for x in gx * cell..((gx + 1) * cell).min(face.ncols()) {
                        let v = face[[y, x]];
                        sum += v;
                        sum_sq += v * v;
                        count += 1;
                    }
                }
                if count == 0 {
                    means.push(0.0);
                    stds.push(0.0);
                    continue;
                }
                let mean = sum / count as f32;
                let var = (sum_sq / count as f32 - mean * mean).max(0.0);
                means.push(mean);
                stds.push(var.sqrt());
            }
        }

        means.extend(stds);
        means
    }

    fn encode_audio(
        &self,
        spectrogram: &Array2<f32>,
        _features: &AcousticFeatureVector,
    ) -> Vec<f32> {
        match spectrogram.mean_axis(Axis(1)) {
            Some(band_means) => {
                let mut out = band_means.to_vec();
                out.resize(AUDIO_EMBED_DIM, 0.0);
                out
            }
            None => vec![0.0; AUDIO_EMBED_DIM],
        }
    }
}
