//! Facial landmark extraction.
//!
//! Locates a single usable face by scanning luminance statistics over an
//! integral image, then maps a fixed 68-point topology onto the detected
//! region. "No face found" is a legitimate outcome, not an error; the
//! extractor only fails on structurally invalid (zero-area) images.
//!
//! The window scoring routine is deliberately separable from landmark
//! emission so a model-backed detector can replace it behind the same
//! contract.

use super::{BoundingBox, PreprocessError};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of facial landmarks in the fixed topology
pub const NUM_LANDMARKS: usize = 68;

/// Smallest candidate window considered by the scanner (pixels)
const MIN_WINDOW: usize = 16;

/// Fixed 68-point face topology in normalized face-box coordinates.
///
/// Ordering follows the classic 68-point layout: jaw line (0-16), eyebrows
/// (17-26), nose bridge and base (27-35), eyes (36-47), outer and inner lips
/// (48-67).
const FACE_TOPOLOGY: [(f32, f32); NUM_LANDMARKS] = [
    // Jaw line
    (0.080, 0.400),
    (0.088, 0.509),
    (0.112, 0.614),
    (0.151, 0.711),
    (0.203, 0.796),
    (0.267, 0.866),
    (0.339, 0.917),
    (0.418, 0.949),
    (0.500, 0.960),
    (0.582, 0.949),
    (0.661, 0.917),
    (0.733, 0.866),
    (0.797, 0.796),
    (0.849, 0.711),
    (0.888, 0.614),
    (0.912, 0.509),
    (0.920, 0.400),
    // Left eyebrow
    (0.160, 0.320),
    (0.220, 0.280),
    (0.290, 0.260),
    (0.360, 0.270),
    (0.420, 0.300),
    // Right eyebrow
    (0.580, 0.300),
    (0.640, 0.270),
    (0.710, 0.260),
    (0.780, 0.280),
    (0.840, 0.320),
    // Nose bridge
    (0.500, 0.360),
    (0.500, 0.450),
    (0.500, 0.540),
    (0.500, 0.620),
    // Nose base
    (0.420, 0.660),
    (0.460, 0.680),
    (0.500, 0.690),
    (0.540, 0.680),
    (0.580, 0.660),
    // Left eye
    (0.230, 0.400),
    (0.270, 0.370),
    (0.330, 0.370),
    (0.370, 0.400),
    (0.330, 0.430),
    (0.270, 0.430),
    // Right eye
    (0.630, 0.400),
    (0.670, 0.370),
    (0.730, 0.370),
    (0.770, 0.400),
    (0.730, 0.430),
    (0.670, 0.430),
    // Outer lips
    (0.360, 0.800),
    (0.400, 0.760),
    (0.450, 0.740),
    (0.500, 0.730),
    (0.550, 0.740),
    (0.600, 0.760),
    (0.640, 0.800),
    (0.600, 0.840),
    (0.550, 0.860),
    (0.500, 0.870),
    (0.450, 0.860),
    (0.400, 0.840),
    // Inner lips
    (0.410, 0.800),
    (0.450, 0.780),
    (0.500, 0.770),
    (0.550, 0.780),
    (0.590, 0.800),
    (0.550, 0.820),
    (0.500, 0.830),
    (0.450, 0.820),
];

/// An extracted set of facial landmarks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkSet {
    /// 2D landmark coordinates in image pixel space, fixed topology order
    pub points: Vec<[f32; 2]>,
    /// Per-point visibility scores (0-1), parallel to `points`
    pub visibility: Vec<f32>,
    /// Min/max envelope of all points, clipped to image bounds
    pub bounding_box: BoundingBox,
}

/// Configuration for the landmark extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Candidate window sizes as fractions of the image's shorter side
    pub window_fractions: Vec<f32>,

    /// Scan step as a divisor of the window size
    pub step_divisor: usize,

    /// Minimum luminance standard deviation inside a candidate window.
    /// Windows below this are treated as featureless (no face).
    pub min_contrast: f32,

    /// Minimum structure score (eye/mouth darkness against the midface,
    /// weighted by left/right symmetry) for a detection
    pub min_score: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_fractions: vec![0.9, 0.75, 0.6, 0.45],
            step_divisor: 8,
            min_contrast: 12.0,
            min_score: 10.0,
        }
    }
}

/// Luminance integral images for O(1) regional statistics
struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl IntegralImage {
    fn new(image: &RgbImage) -> Self {
        let width = image.width() as usize;
        let height = image.height() as usize;
        let stride = width + 1;

        let mut sum = vec![0.0f64; stride * (height + 1)];
        let mut sum_sq = vec![0.0f64; stride * (height + 1)];

        for y in 0..height {
            let mut row_sum = 0.0f64;
            let mut row_sq = 0.0f64;
            for x in 0..width {
                let p = image.get_pixel(x as u32, y as u32).0;
                // Rec. 601 luma
                let v = 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64;
                row_sum += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
                sum_sq[(y + 1) * stride + x + 1] = sum_sq[y * stride + x + 1] + row_sq;
            }
        }

        Self {
            width,
            height,
            sum,
            sum_sq,
        }
    }

    /// Mean and standard deviation of the region [x0, x1) x [y0, y1)
    fn stats(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> (f32, f32) {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return (0.0, 0.0);
        }

        let stride = self.width + 1;
        let area = ((x1 - x0) * (y1 - y0)) as f64;

        let s = self.sum[y1 * stride + x1] - self.sum[y0 * stride + x1]
            - self.sum[y1 * stride + x0]
            + self.sum[y0 * stride + x0];
        let sq = self.sum_sq[y1 * stride + x1] - self.sum_sq[y0 * stride + x1]
            - self.sum_sq[y1 * stride + x0]
            + self.sum_sq[y0 * stride + x0];

        let mean = s / area;
        let var = (sq / area - mean * mean).max(0.0);
        (mean as f32, var.sqrt() as f32)
    }

    fn mean(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f32 {
        self.stats(x0, y0, x1, y1).0
    }
}

/// Best-scoring candidate face window
struct Candidate {
    score: f32,
    x: usize,
    y: usize,
    size: usize,
}

/// Facial landmark extractor
pub struct LandmarkExtractor {
    config: DetectorConfig,
}

impl LandmarkExtractor {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Locate a face and extract its landmark set.
    ///
    /// Returns `Ok(None)` when no face is found. Fails only on zero-area
    /// images.
    pub fn detect(&self, image: &RgbImage) -> Result<Option<LandmarkSet>, PreprocessError> {
        let width = image.width();
        let height = image.height();
        if width == 0 || height == 0 {
            return Err(PreprocessError::EmptyImage { width, height });
        }

        let integral = IntegralImage::new(image);
        let candidate = self.scan(&integral);

        let candidate = match candidate {
            Some(c) if c.score >= self.config.min_score => c,
            _ => {
                debug!("No face found in {}x{} image", width, height);
                return Ok(None);
            }
        };

        debug!(
            "Face window at ({}, {}) size {} score {:.1}",
            candidate.x, candidate.y, candidate.size, candidate.score
        );

        Ok(Some(self.emit_landmarks(&integral, &candidate, width, height)))
    }

    /// Scan candidate windows over the integral image, keeping the best score
    fn scan(&self, integral: &IntegralImage) -> Option<Candidate> {
        let short_side = integral.width.min(integral.height);
        let mut best: Option<Candidate> = None;

        for &frac in &self.config.window_fractions {
            let size = (short_side as f32 * frac) as usize;
            if size < MIN_WINDOW {
                continue;
            }
            let step = (size / self.config.step_divisor).max(1);

            let mut y = 0;
            while y + size <= integral.height {
                let mut x = 0;
                while x + size <= integral.width {
                    let score = self.score_window(integral, x, y, size);
                    if best.as_ref().map_or(true, |b| score > b.score) {
                        best = Some(Candidate { score, x, y, size });
                    }
                    x += step;
                }
                y += step;
            }
        }

        best
    }

    /// Score a window by face-like internal structure.
    ///
    /// Eyes and mouth sit darker than the midface in a face-like window, and
    /// the left and right halves are roughly symmetric in mean luminance.
    fn score_window(&self, integral: &IntegralImage, x: usize, y: usize, size: usize) -> f32 {
        let (_, std) = integral.stats(x, y, x + size, y + size);
        if std < self.config.min_contrast {
            return 0.0;
        }

        let region = |fx0: f32, fy0: f32, fx1: f32, fy1: f32| {
            integral.mean(
                x + (size as f32 * fx0) as usize,
                y + (size as f32 * fy0) as usize,
                x + (size as f32 * fx1) as usize,
                y + (size as f32 * fy1) as usize,
            )
        };

        let eye_left = region(0.18, 0.30, 0.42, 0.48);
        let eye_right = region(0.58, 0.30, 0.82, 0.48);
        let midface = region(0.25, 0.50, 0.75, 0.68);
        let mouth = region(0.35, 0.70, 0.65, 0.88);

        let d_eyes = (midface - (eye_left + eye_right) / 2.0).max(0.0);
        let d_mouth = (midface - mouth).max(0.0);

        let left_half = region(0.0, 0.0, 0.5, 1.0);
        let right_half = region(0.5, 0.0, 1.0, 1.0);
        let symmetry = (1.0 - (left_half - right_half).abs() / 64.0).clamp(0.0, 1.0);

        (d_eyes + d_mouth) * symmetry
    }

    /// Map the fixed topology onto the detected window
    fn emit_landmarks(
        &self,
        integral: &IntegralImage,
        candidate: &Candidate,
        width: u32,
        height: u32,
    ) -> LandmarkSet {
        let size = candidate.size as f32;
        let points: Vec<[f32; 2]> = FACE_TOPOLOGY
            .iter()
            .map(|&(tx, ty)| {
                [
                    candidate.x as f32 + tx * size,
                    candidate.y as f32 + ty * size,
                ]
            })
            .collect();

        let radius = (candidate.size / 16).max(2);
        let visibility: Vec<f32> = points
            .iter()
            .map(|p| {
                let cx = p[0] as usize;
                let cy = p[1] as usize;
                let x0 = cx.saturating_sub(radius);
                let y0 = cy.saturating_sub(radius);
                let (_, std) = integral.stats(x0, y0, cx + radius, cy + radius);
                (0.5 + std / 48.0).clamp(0.0, 1.0)
            })
            .collect();

        let bounding_box = BoundingBox::envelope(&points, width, height);

        LandmarkSet {
            points,
            visibility,
            bounding_box,
        }
    }
}

impl Default for LandmarkExtractor {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
