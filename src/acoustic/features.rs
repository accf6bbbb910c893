//! Fixed-length acoustic feature extraction.
//!
//! Framed spectral analysis over 25 ms windows with a 10 ms hop: MFCC means,
//! fundamental frequency, energy, spectral centroid, zero-crossing rate,
//! spectral rolloff and chroma bins. Clips shorter than one analysis frame
//! yield a zero-filled vector rather than an error.

use crate::dsp;
use pitch_detection::detector::mcleod::McLeodDetector;
use pitch_detection::detector::PitchDetector;
use realfft::{num_complex::Complex, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of cepstral coefficients retained
pub const N_MFCC: usize = 13;

/// Number of chroma (pitch-class) bins
pub const N_CHROMA: usize = 12;

/// Mel filters used for the cepstral analysis
const N_MEL_FILTERS: usize = 40;

/// Analysis frame length (25ms at 16kHz)
const FRAME_SIZE: usize = 400;

/// Hop between analysis frames (10ms at 16kHz)
const HOP_SIZE: usize = 160;

/// FFT size (frames are zero-padded up to this)
const N_FFT: usize = 512;

/// Fraction of spectral energy below the rolloff frequency
const ROLLOFF_FRACTION: f32 = 0.85;

/// Small value added before log for numerical stability
const LOG_OFFSET: f32 = 1e-6;

/// Frame size for pitch detection (~64ms at 16kHz)
const PITCH_FRAME: usize = 1024;

/// Hop size between pitch frames (50% overlap)
const PITCH_HOP: usize = 512;

/// Human vocal range bounds in Hz
const MIN_PITCH: f32 = 50.0;
const MAX_PITCH: f32 = 500.0;

/// Power threshold for pitch detection
const POWER_THRESHOLD: f32 = 0.8;

/// Clarity threshold for pitch detection
const CLARITY_THRESHOLD: f32 = 0.5;

/// Minimum number of voiced frames for valid pitch statistics
const MIN_VOICED_FRAMES: usize = 5;

/// Fixed-length acoustic descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcousticFeatureVector {
    /// Mean mel-frequency cepstral coefficients
    pub mfccs: [f32; N_MFCC],
    /// Mean fundamental frequency of voiced frames (Hz, 0 when unvoiced)
    pub pitch: f32,
    /// Mean frame RMS
    pub energy: f32,
    /// Mean spectral centroid (Hz)
    pub spectral_centroid: f32,
    /// Mean zero-crossing rate
    pub zero_crossing_rate: f32,
    /// Mean spectral rolloff frequency (Hz)
    pub spectral_rolloff: f32,
    /// Mean chroma bins, normalized to the strongest pitch class
    pub chroma: [f32; N_CHROMA],
}

impl AcousticFeatureVector {
    /// All-zero vector, used for clips shorter than one analysis frame
    pub fn zeroed() -> Self {
        Self {
            mfccs: [0.0; N_MFCC],
            pitch: 0.0,
            energy: 0.0,
            spectral_centroid: 0.0,
            zero_crossing_rate: 0.0,
            spectral_rolloff: 0.0,
            chroma: [0.0; N_CHROMA],
        }
    }

    /// True when every field holds a finite value
    pub fn is_finite(&self) -> bool {
        self.mfccs.iter().all(|v| v.is_finite())
            && self.chroma.iter().all(|v| v.is_finite())
            && self.pitch.is_finite()
            && self.energy.is_finite()
            && self.spectral_centroid.is_finite()
            && self.zero_crossing_rate.is_finite()
            && self.spectral_rolloff.is_finite()
    }
}

/// Acoustic feature extractor with precomputed window and filterbank
pub struct FeatureExtractor {
    sample_rate: u32,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    filterbank: Vec<Vec<f32>>,
}

impl FeatureExtractor {
    pub fn new(sample_rate: u32) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(N_FFT);
        let window = dsp::hann_window(FRAME_SIZE);
        let fmax = (sample_rate as f32 / 2.0).min(7600.0);
        let filterbank =
            dsp::mel_filterbank(N_MEL_FILTERS, N_FFT / 2 + 1, sample_rate as f32, 20.0, fmax);

        Self {
            sample_rate,
            fft,
            window,
            filterbank,
        }
    }

    /// Compute the fixed-length descriptor for a mono clip.
    ///
    /// Clips shorter than one frame return [`AcousticFeatureVector::zeroed`].
    pub fn extract(&self, samples: &[f32]) -> AcousticFeatureVector {
        if samples.len() < FRAME_SIZE {
            return AcousticFeatureVector::zeroed();
        }

        let n_frames = 1 + (samples.len() - FRAME_SIZE) / HOP_SIZE;
        let bin_hz = self.sample_rate as f32 / N_FFT as f32;

        let mut fft_input = vec![0.0f32; N_FFT];
        let mut fft_output = vec![Complex::new(0.0f32, 0.0); N_FFT / 2 + 1];

        let mut mfcc_sum = [0.0f32; N_MFCC];
        let mut chroma_sum = [0.0f32; N_CHROMA];
        let mut centroid_sum = 0.0f32;
        let mut rolloff_sum = 0.0f32;
        let mut zcr_sum = 0.0f32;
        let mut energy_sum = 0.0f32;
        let mut frames_used = 0usize;

        for frame_idx in 0..n_frames {
            let start = frame_idx * HOP_SIZE;
            let frame = &samples[start..start + FRAME_SIZE];

            fft_input.fill(0.0);
            for (i, (&s, &w)) in frame.iter().zip(self.window.iter()).enumerate() {
                fft_input[i] = s * w;
            }
            if self.fft.process(&mut fft_input, &mut fft_output).is_err() {
                continue;
            }
            frames_used += 1;

            let power: Vec<f32> = fft_output.iter().map(|c| c.re * c.re + c.im * c.im).collect();
            let total_power: f32 = power.iter().sum();

            // Cepstral coefficients from log mel energies
            let log_mel: Vec<f32> = self
                .filterbank
                .iter()
                .map(|filter| {
                    let energy: f32 = filter
                        .iter()
                        .zip(power.iter())
                        .map(|(f, p)| f * p)
                        .sum();
                    (energy + LOG_OFFSET).ln()
                })
                .collect();
            for (sum, c) in mfcc_sum.iter_mut().zip(dsp::dct_ii(&log_mel, N_MFCC)) {
                *sum += c;
            }

            if total_power > 1e-12 {
                // Spectral centroid
                let weighted: f32 = power
                    .iter()
                    .enumerate()
                    .map(|(k, p)| k as f32 * bin_hz * p)
                    .sum();
                centroid_sum += weighted / total_power;

                // Spectral rolloff
                let target = total_power * ROLLOFF_FRACTION;
                let mut cumulative = 0.0f32;
                for (k, p) in power.iter().enumerate() {
                    cumulative += p;
                    if cumulative >= target {
                        rolloff_sum += k as f32 * bin_hz;
                        break;
                    }
                }

                // Chroma: fold bin power onto pitch classes
                for (k, &p) in power.iter().enumerate().skip(1) {
                    let freq = k as f32 * bin_hz;
                    if freq < 27.5 {
                        continue;
                    }
                    let midi = 69.0 + 12.0 * (freq / 440.0).log2();
                    let class = (midi.round() as i64).rem_euclid(12) as usize;
                    chroma_sum[class] += p;
                }
            }

            // Zero-crossing rate on the raw frame
            let crossings = frame
                .windows(2)
                .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                .count();
            zcr_sum += crossings as f32 / (FRAME_SIZE - 1) as f32;

            // Frame RMS
            let rms = (frame.iter().map(|s| s * s).sum::<f32>() / FRAME_SIZE as f32).sqrt();
            energy_sum += rms;
        }

        if frames_used == 0 {
            return AcousticFeatureVector::zeroed();
        }

        let scale = 1.0 / frames_used as f32;
        let mut mfccs = [0.0f32; N_MFCC];
        for (dst, src) in mfccs.iter_mut().zip(mfcc_sum.iter()) {
            *dst = src * scale;
        }

        let mut chroma = [0.0f32; N_CHROMA];
        let chroma_max = chroma_sum.iter().cloned().fold(0.0f32, f32::max);
        if chroma_max > 0.0 {
            for (dst, src) in chroma.iter_mut().zip(chroma_sum.iter()) {
                *dst = src / chroma_max;
            }
        }

        let pitch = pitch_stats(samples, self.sample_rate)
            .map(|(mean, _, _)| mean)
            .unwrap_or(0.0);

        AcousticFeatureVector {
            mfccs,
            pitch,
            energy: energy_sum * scale,
            spectral_centroid: centroid_sum * scale,
            zero_crossing_rate: zcr_sum * scale,
            spectral_rolloff: rolloff_sum * scale,
            chroma,
        }
    }
}

/// Pitch statistics over voiced frames.
///
/// Returns `Some((f0_mean, f0_std, voiced_ratio))` when enough voiced frames
/// fall in the human vocal range, `None` otherwise.
pub(crate) fn pitch_stats(samples: &[f32], sample_rate: u32) -> Option<(f32, f32, f32)> {
    if samples.len() < PITCH_FRAME {
        return None;
    }

    let mut detector = McLeodDetector::new(PITCH_FRAME, PITCH_FRAME / 2);
    let mut pitches = Vec::new();
    let mut total_frames = 0usize;

    let mut start = 0;
    while start + PITCH_FRAME <= samples.len() {
        let frame = &samples[start..start + PITCH_FRAME];
        total_frames += 1;

        if let Some(pitch) = detector.get_pitch(
            frame,
            sample_rate as usize,
            POWER_THRESHOLD,
            CLARITY_THRESHOLD,
        ) {
            if pitch.frequency >= MIN_PITCH && pitch.frequency <= MAX_PITCH {
                pitches.push(pitch.frequency);
            }
        }

        start += PITCH_HOP;
    }

    if pitches.len() < MIN_VOICED_FRAMES {
        return None;
    }

    let mean = pitches.iter().sum::<f32>() / pitches.len() as f32;
    let variance = pitches.iter().map(|p| (p - mean).powi(2)).sum::<f32>() / pitches.len() as f32;
    let voiced_ratio = pitches.len() as f32 / total_frames as f32;

    Some((mean, variance.sqrt(), voiced_ratio))
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

    fn generate_noise(sample_rate: u32, duration_ms: u32) -> Vec<f32> {
        let n = (sample_rate * duration_ms / 1000) as usize;
        let mut seed = 12345u32;
        (0..n)
            .map(|_| {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                ((seed >> 16) as f32 / 32768.0 - 1.0) * 0.3
            })
            .collect()
    }

    #[test]
    fn test_extract_short_clip_is_zeroed() {
        let extractor = FeatureExtractor::new(16000);
        let features = extractor.extract(&[0.1; 100]);
        assert_eq!(features.energy, 0.0);
        assert_eq!(features.pitch, 0.0);
        assert!(features.mfccs.iter().all(|&c| c == 0.0));
        assert!(features.chroma.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_extract_empty_clip_is_zeroed() {
        let extractor = FeatureExtractor::new(16000);
        let features = extractor.extract(&[]);
        assert!(features.is_finite());
        assert_eq!(features.energy, 0.0);
    }

    #[test]
    fn test_extract_tone_features() {
        let extractor = FeatureExtractor::new(16000);
        let samples = generate_sine(440.0, 16000, 1000);
        let features = extractor.extract(&samples);

        assert!(features.is_finite());
        // RMS of a 0.5-amplitude sine is ~0.35
        assert!(features.energy > 0.2, "energy {}", features.energy);
        // Centroid near the tone frequency
        assert!(
            features.spectral_centroid > 300.0 && features.spectral_centroid < 900.0,
            "centroid {}",
            features.spectral_centroid
        );
        // ZCR of a 440 Hz tone at 16 kHz is ~2*440/16000
        assert!(
            features.zero_crossing_rate > 0.03 && features.zero_crossing_rate < 0.09,
            "zcr {}",
            features.zero_crossing_rate
        );
        // Pitch detection should find the fundamental
        assert!(
            (features.pitch - 440.0).abs() < 25.0,
            "pitch {}",
            features.pitch
        );
        // A (440 Hz) is pitch class 9; it should dominate the chroma
        assert_eq!(features.chroma[9], 1.0);
        assert!(features.spectral_rolloff >= features.spectral_centroid * 0.5);
    }

    #[test]
    fn test_extract_silence() {
        let extractor = FeatureExtractor::new(16000);
        let features = extractor.extract(&vec![0.0; 16000]);

        assert!(features.is_finite());
        assert_eq!(features.energy, 0.0);
        assert_eq!(features.pitch, 0.0);
        assert_eq!(features.spectral_centroid, 0.0);
        assert!(features.chroma.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_extract_noise_is_finite() {
        let extractor = FeatureExtractor::new(16000);
        let features = extractor.extract(&generate_noise(16000, 800));

        assert!(features.is_finite());
        assert!(features.energy > 0.0);
        assert!(features.pitch >= 0.0);
        // Broadband noise crosses zero far more often than a low tone
        assert!(features.zero_crossing_rate > 0.1);
    }

    #[test]
    fn test_pitch_stats_constant_tone() {
        let samples = generate_sine(200.0, 16000, 1000);
        let (mean, std, voiced_ratio) = pitch_stats(&samples, 16000).unwrap();

        assert!((mean - 200.0).abs() < 20.0, "mean {}", mean);
        assert!(std < 10.0, "std {}", std);
        assert!(voiced_ratio > 0.5);
    }

    #[test]
    fn test_pitch_stats_varying_tone() {
        let mut samples = generate_sine(150.0, 16000, 500);
        samples.extend(generate_sine(250.0, 16000, 500));

        let (mean, std, _) = pitch_stats(&samples, 16000).unwrap();
        assert!(mean > 100.0 && mean < 300.0);
        assert!(std > 10.0, "expected pitch spread, std {}", std);
    }

    #[test]
    fn test_pitch_stats_silence() {
        assert!(pitch_stats(&vec![0.0; 16000], 16000).is_none());
    }

    #[test]
    fn test_pitch_stats_short_input() {
        assert!(pitch_stats(&[0.1; 100], 16000).is_none());
    }
}
