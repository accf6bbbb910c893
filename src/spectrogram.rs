//! Mel spectrogram generation for the audio classifier.
//!
//! Converts a mono clip to a log-scaled mel time-frequency tensor with a
//! fixed time axis: per-clip zero-mean/unit-variance normalization, then
//! truncation or zero-padding to the configured frame count.

use crate::dsp;
use ndarray::Array2;
use realfft::{num_complex::Complex, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Epsilon substituted when the clip's standard deviation is ~0 (silence)
const NORM_EPSILON: f32 = 1e-6;

/// Configuration for mel spectrogram generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MelConfig {
    /// Sample rate of input audio
    pub sample_rate: u32,

    /// FFT size
    pub n_fft: usize,

    /// Hop length between frames (in samples)
    pub hop_length: usize,

    /// Window length (in samples)
    pub win_length: usize,

    /// Number of mel frequency bands
    pub n_mels: usize,

    /// Minimum frequency for mel filterbank (Hz)
    pub fmin: f32,

    /// Maximum frequency for mel filterbank (Hz)
    pub fmax: f32,

    /// Small value added before log for numerical stability
    pub log_offset: f32,

    /// Fixed number of time frames in the output tensor
    pub n_frames: usize,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            n_fft: 512,
            hop_length: 160, // 10ms at 16kHz
            win_length: 400, // 25ms at 16kHz
            n_mels: 128,
            fmin: 20.0,
            fmax: 7600.0,
            log_offset: 1e-6,
            n_frames: 128,
        }
    }
}

/// Mel spectrogram builder with pre-computed filterbank, window and FFT plan
pub struct SpectrogramBuilder {
    config: MelConfig,
    fft: Arc<dyn RealToComplex<f32>>,
    filterbank: Vec<Vec<f32>>,
    window: Vec<f32>,
}

impl SpectrogramBuilder {
    pub fn new(config: MelConfig) -> Self {
        let window = dsp::hann_window(config.win_length);
        let filterbank = dsp::mel_filterbank(
            config.n_mels,
            config.n_fft / 2 + 1,
            config.sample_rate as f32,
            config.fmin,
            config.fmax,
        );

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.n_fft);

        Self {
            config,
            fft,
            filterbank,
            window,
        }
    }

    pub fn config(&self) -> &MelConfig {
        &self.config
    }

    /// Build the fixed-shape tensor `(n_mels, n_frames)` for a mono clip.
    ///
    /// Longer clips are truncated, shorter clips zero-padded along the time
    /// axis. Silence degrades gracefully to an all-zero tensor.
    pub fn build(&self, samples: &[f32]) -> Array2<f32> {
        let cfg = &self.config;
        let raw_frames = if samples.len() >= cfg.win_length {
            1 + (samples.len() - cfg.win_length) / cfg.hop_length
        } else {
            1
        };
        let used_frames = raw_frames.min(cfg.n_frames);

        let mut fft_input = vec![0.0f32; cfg.n_fft];
        let mut fft_output = vec![Complex::new(0.0f32, 0.0); cfg.n_fft / 2 + 1];
        let mut frames: Vec<Vec<f32>> = Vec::with_capacity(used_frames);

        for frame_idx in 0..used_frames {
            let start = frame_idx * cfg.hop_length;
            let end = (start + cfg.win_length).min(samples.len());

            fft_input.fill(0.0);
            for (i, &sample) in samples[start.min(samples.len())..end].iter().enumerate() {
                if i < self.window.len() {
                    fft_input[i] = sample * self.window[i];
                }
            }

            if self.fft.process(&mut fft_input, &mut fft_output).is_err() {
                frames.push(vec![0.0; cfg.n_mels]);
                continue;
            }

            let power: Vec<f32> = fft_output.iter().map(|c| c.re * c.re + c.im * c.im).collect();

            let mel_frame: Vec<f32> = self
                .filterbank
                .iter()
                .map(|filter| {
                    let energy: f32 = filter
                        .iter()
                        .zip(power.iter())
                        .map(|(f, p)| f * p)
                        .sum();
                    (energy + cfg.log_offset).ln()
                })
                .collect();

            frames.push(mel_frame);
        }

        // Per-clip normalization over the computed frames
        let count = (frames.len() * cfg.n_mels) as f32;
        let mean = frames.iter().flatten().sum::<f32>() / count;
        let var = frames
            .iter()
            .flatten()
            .map(|v| (v - mean).powi(2))
            .sum::<f32>()
            / count;
        let std = var.sqrt().max(NORM_EPSILON);

        let mut tensor = Array2::<f32>::zeros((cfg.n_mels, cfg.n_frames));
        for (t, frame) in frames.iter().enumerate() {
            for (m, &v) in frame.iter().enumerate() {
                tensor[[m, t]] = (v - mean) / std;
            }
        }

        tensor
    }
}

impl Default for SpectrogramBuilder {
    fn default() -> Self {
        Self::new(MelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn generate_sine(freq: f32, sample_rate: u32, duration_ms: u32) -> Vec<f32> {
        let n = (sample_rate * duration_ms / 1000) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_fixed_shape_regardless_of_length() {
        let builder = SpectrogramBuilder::default();

        let short = builder.build(&generate_sine(440.0, 16000, 500));
        let long = builder.build(&generate_sine(440.0, 16000, 5000));

        assert_eq!(short.dim(), (128, 128));
        assert_eq!(long.dim(), (128, 128));
    }

    #[test]
    fn test_empty_input_yields_zero_tensor() {
        let builder = SpectrogramBuilder::default();
        let tensor = builder.build(&[]);

        assert_eq!(tensor.dim(), (128, 128));
        assert!(tensor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_silence_yields_zero_tensor() {
        let builder = SpectrogramBuilder::default();
        let tensor = builder.build(&vec![0.0f32; 16000]);

        // Constant log floor normalizes to zero everywhere
        assert!(tensor.iter().all(|v| v.abs() < 1e-3));
        assert!(tensor.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_short_clip_pads_with_zeros() {
        let builder = SpectrogramBuilder::default();
        // 0.5s -> ~48 real frames, the rest padded
        let tensor = builder.build(&generate_sine(440.0, 16000, 500));

        let last_column: Vec<f32> = (0..128).map(|m| tensor[[m, 127]]).collect();
        assert!(last_column.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_tone_has_band_structure() {
        let builder = SpectrogramBuilder::default();
        let tensor = builder.build(&generate_sine(1000.0, 16000, 2000));

        // Normalized output: the tone bands stand far above the mean while
        // the floor sits just below it
        let max = tensor.iter().cloned().fold(f32::MIN, f32::max);
        let min = tensor.iter().cloned().fold(f32::MAX, f32::min);
        assert!(max > 1.0, "max {}", max);
        assert!(min < 0.0, "min {}", min);
        assert!(tensor.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_long_clip_truncates() {
        let builder = SpectrogramBuilder::default();
        let tensor = builder.build(&generate_sine(440.0, 16000, 10000));

        // All frames computed from real audio: the last column carries signal
        let last_column_energy: f32 = (0..128).map(|m| tensor[[m, 127]].abs()).sum();
        assert!(last_column_energy > 0.0);
    }
}
