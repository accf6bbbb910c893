//! Audio payload decoding and resampling to the fixed pipeline rate.

use super::DecodeError;
use hound::SampleFormat;
use rubato::{FftFixedIn, Resampler};
use std::io::Cursor;
use tracing::debug;

/// Target sample rate for all downstream analysis
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Chunk size fed to the resampler
const RESAMPLE_CHUNK: usize = 1024;

/// A decoded mono audio clip at [`TARGET_SAMPLE_RATE`]
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    /// Clip duration in seconds
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode a WAV payload to a mono clip at [`TARGET_SAMPLE_RATE`]
///
/// Multi-channel input is downmixed by channel averaging; input at any other
/// sample rate is resampled.
pub fn decode_audio(bytes: &[u8]) -> Result<AudioClip, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| DecodeError::MalformedAudio(e.to_string()))?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(DecodeError::UnsupportedFormat(
            "WAV declares zero channels".to_string(),
        ));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| DecodeError::MalformedAudio(e.to_string()))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| DecodeError::MalformedAudio(e.to_string()))?
        }
    };

    if interleaved.is_empty() {
        return Err(DecodeError::MalformedAudio(
            "payload decoded to zero samples".to_string(),
        ));
    }

    let mono = downmix(&interleaved, spec.channels as usize);

    let samples = if spec.sample_rate == TARGET_SAMPLE_RATE {
        mono
    } else {
        resample(&mono, spec.sample_rate)?
    };

    debug!(
        "Decoded audio: {} samples at {} Hz ({:.2}s, {} ch input at {} Hz)",
        samples.len(),
        TARGET_SAMPLE_RATE,
        samples.len() as f32 / TARGET_SAMPLE_RATE as f32,
        spec.channels,
        spec.sample_rate
    );

    Ok(AudioClip {
        samples,
        sample_rate: TARGET_SAMPLE_RATE,
    })
}

/// Average interleaved channels down to mono
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample a mono buffer to [`TARGET_SAMPLE_RATE`]
fn resample(samples: &[f32], from_rate: u32) -> Result<Vec<f32>, DecodeError> {
    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        TARGET_SAMPLE_RATE as usize,
        RESAMPLE_CHUNK,
        2,
        1,
    )
    .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let delay = resampler.output_delay();
    let expected = ((samples.len() as f64 * TARGET_SAMPLE_RATE as f64 / from_rate as f64).round()
        as usize)
        .max(1);

    let mut input_buffer = vec![vec![0.0f32; RESAMPLE_CHUNK]];
    let mut output_buffer = resampler.output_buffer_allocate(true);
    let mut out = Vec::with_capacity(expected + delay);

    let mut offset = 0;
    // Feed the whole clip, then zero chunks until the FFT latency is flushed
    while out.len() < delay + expected {
        let chunk = &mut input_buffer[0];
        chunk.fill(0.0);
        if offset < samples.len() {
            let end = (offset + RESAMPLE_CHUNK).min(samples.len());
            chunk[..end - offset].copy_from_slice(&samples[offset..end]);
            offset = end;
        }

        let (_, output_frames) = resampler
            .process_into_buffer(&input_buffer, &mut output_buffer, None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        out.extend_from_slice(&output_buffer[0][..output_frames]);
    }

    Ok(out[delay..delay + expected].to_vec())
}
