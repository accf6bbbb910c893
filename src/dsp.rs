//! Shared spectral analysis primitives.
//!
//! Window and mel filterbank construction used by both the acoustic feature
//! extractor and the spectrogram builder.

use std::f32::consts::PI;

/// Create a Hann window of the given length
pub(crate) fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (len - 1) as f32).cos()))
        .collect()
}

/// Convert frequency to mel scale
pub(crate) fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert mel scale to frequency
pub(crate) fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Create a triangular mel filterbank matrix
///
/// # Arguments
/// * `n_mels` - Number of mel bands
/// * `n_fft_bins` - Number of FFT bins (n_fft/2 + 1)
/// * `sample_rate` - Audio sample rate in Hz
/// * `fmin` - Minimum frequency for mel bands
/// * `fmax` - Maximum frequency for mel bands
///
/// # Returns
/// Vec of mel filters, each filter is a Vec of weights for FFT bins
pub(crate) fn mel_filterbank(
    n_mels: usize,
    n_fft_bins: usize,
    sample_rate: f32,
    fmin: f32,
    fmax: f32,
) -> Vec<Vec<f32>> {
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);

    // n_mels + 2 equally spaced points in mel scale
    let mel_points: Vec<f32> = (0..=n_mels + 1)
        .map(|i| mel_min + (mel_max - mel_min) * (i as f32) / ((n_mels + 1) as f32))
        .collect();

    let hz_points: Vec<f32> = mel_points.iter().map(|&m| mel_to_hz(m)).collect();

    let fft_bin_points: Vec<f32> = hz_points
        .iter()
        .map(|&hz| (n_fft_bins as f32 - 1.0) * hz / (sample_rate / 2.0))
        .collect();

    let mut filterbank = Vec::with_capacity(n_mels);

    for i in 0..n_mels {
        let mut filter = vec![0.0f32; n_fft_bins];

        let left = fft_bin_points[i];
        let center = fft_bin_points[i + 1];
        let right = fft_bin_points[i + 2];

        for (bin, weight) in filter.iter_mut().enumerate() {
            let bin_f = bin as f32;

            if bin_f >= left && bin_f < center {
                // Rising edge
                *weight = (bin_f - left) / (center - left);
            } else if bin_f >= center && bin_f <= right {
                // Falling edge
                *weight = (right - bin_f) / (right - center);
            }
        }

        filterbank.push(filter);
    }

    filterbank
}

/// Orthonormal DCT-II of the input, truncated to `n_out` coefficients
pub(crate) fn dct_ii(input: &[f32], n_out: usize) -> Vec<f32> {
    let n = input.len();
    if n == 0 {
        return vec![0.0; n_out];
    }

    let mut out = Vec::with_capacity(n_out);
    for k in 0..n_out {
        let mut sum = 0.0f32;
        for (i, &x) in input.iter().enumerate() {
            sum += x * (PI * k as f32 * (2 * i + 1) as f32 / (2 * n) as f32).cos();
        }
        let scale = if k == 0 {
            (1.0 / n as f32).sqrt()
        } else {
            (2.0 / n as f32).sqrt()
        };
        out.push(sum * scale);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window_endpoints() {
        let window = hann_window(400);
        assert!(window[0].abs() < 1e-6);
        assert!(window[399].abs() < 1e-6);
        // Peak near the middle
        assert!(window[200] > 0.99);
    }

    #[test]
    fn test_hz_to_mel() {
        // 0 Hz should map to 0 mel
        assert!((hz_to_mel(0.0) - 0.0).abs() < 1e-6);

        // 1000 Hz is approximately 1000 mel (by design of the scale)
        let mel_1000 = hz_to_mel(1000.0);
        assert!((mel_1000 - 1000.0).abs() < 50.0);
    }

    #[test]
    fn test_mel_to_hz_roundtrip() {
        for hz in [100.0, 500.0, 1000.0, 2000.0, 4000.0, 7600.0] {
            let mel = hz_to_mel(hz);
            let hz_back = mel_to_hz(mel);
            assert!((hz - hz_back).abs() < 1e-3, "Roundtrip failed for {} Hz", hz);
        }
    }

    #[test]
    fn test_mel_filterbank_shape() {
        let filterbank = mel_filterbank(40, 257, 16000.0, 20.0, 7600.0);

        assert_eq!(filterbank.len(), 40);
        for filter in &filterbank {
            assert_eq!(filter.len(), 257);
            for &weight in filter {
                assert!(weight >= 0.0);
            }
            let sum: f32 = filter.iter().sum();
            assert!(sum > 0.0, "Filter should have non-zero weights");
        }
    }

    #[test]
    fn test_dct_constant_signal() {
        // A constant signal concentrates all energy in coefficient 0
        let input = vec![1.0f32; 40];
        let coeffs = dct_ii(&input, 13);

        assert!(coeffs[0] > 1.0);
        for &c in &coeffs[1..] {
            assert!(c.abs() < 1e-4, "Expected near-zero AC coefficient, got {}", c);
        }
    }

    #[test]
    fn test_dct_empty_input() {
        let coeffs = dct_ii(&[], 13);
        assert_eq!(coeffs.len(), 13);
        assert!(coeffs.iter().all(|&c| c == 0.0));
    }
}
