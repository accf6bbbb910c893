//! Speech-pattern analysis for wellness indicators.
//!
//! Computed from the raw sample sequence, independently of the primary
//! feature vector. Consumed by the wellness collaborator only; the emotion
//! pipeline itself never reads these values.

use super::pitch_stats;
use serde::{Deserialize, Serialize};

/// Frame length for energy analysis (25ms at 16kHz)
const FRAME_SIZE: usize = 400;

/// Hop between energy frames (10ms at 16kHz)
const HOP_SIZE: usize = 160;

/// Percentile of frame energy used as the voice-activity threshold
const VAD_PERCENTILE: f32 = 0.30;

/// Speech-pattern indicators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechPatterns {
    /// Fraction of frames above the energy threshold (0-1)
    pub voice_activity_ratio: f32,
    /// Ratio of total clip duration to active-speech duration
    pub speaking_rate: f32,
    /// Standard deviation of F0 over voiced frames (Hz)
    pub pitch_variation: f32,
    /// Standard deviation of frame RMS
    pub energy_variation: f32,
}

impl SpeechPatterns {
    fn zeroed() -> Self {
        Self {
            voice_activity_ratio: 0.0,
            speaking_rate: 0.0,
            pitch_variation: 0.0,
            energy_variation: 0.0,
        }
    }
}

/// Analyze speech patterns from a mono clip
pub fn analyze_speech_patterns(samples: &[f32], sample_rate: u32) -> SpeechPatterns {
    if samples.len() < FRAME_SIZE {
        return SpeechPatterns::zeroed();
    }

    let n_frames = 1 + (samples.len() - FRAME_SIZE) / HOP_SIZE;
    let rms: Vec<f32> = (0..n_frames)
        .map(|i| {
            let frame = &samples[i * HOP_SIZE..i * HOP_SIZE + FRAME_SIZE];
            (frame.iter().map(|s| s * s).sum::<f32>() / FRAME_SIZE as f32).sqrt()
        })
        .collect();

    // Energy-percentile voice activity detection
    let mut sorted = rms.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let threshold = sorted[((sorted.len() - 1) as f32 * VAD_PERCENTILE).round() as usize];

    let active_frames = rms.iter().filter(|&&v| v > threshold).count();
    let voice_activity_ratio = active_frames as f32 / n_frames as f32;

    let total_secs = samples.len() as f32 / sample_rate as f32;
    let speaking_secs = active_frames as f32 * HOP_SIZE as f32 / sample_rate as f32;
    let speaking_rate = if speaking_secs > 0.0 {
        total_secs / speaking_secs
    } else {
        0.0
    };

    let rms_mean = rms.iter().sum::<f32>() / rms.len() as f32;
    let energy_variation = (rms.iter().map(|v| (v - rms_mean).powi(2)).sum::<f32>()
        / rms.len() as f32)
        .sqrt();

    let pitch_variation = pitch_stats(samples, sample_rate)
        .map(|(_, std, _)| std)
        .unwrap_or(0.0);

    SpeechPatterns {
        voice_activity_ratio,
        speaking_rate,
        pitch_variation,
        energy_variation,
    }
}
