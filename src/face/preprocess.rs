//! Face-region preprocessing for the visual classifier.
//!
//! Crops the landmarked face with a fixed padding margin, resizes to the
//! classifier input size, converts to single-channel intensity and normalizes
//! to the unit range.

use super::{LandmarkSet, PreprocessError};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array2;

/// Side length of the square tensor the visual classifier consumes
pub const FACE_TENSOR_SIZE: usize = 48;

/// Default crop padding around the landmark bounding box (pixels)
pub const DEFAULT_FACE_PADDING: u32 = 20;

/// Face preprocessor
pub struct FacePreprocessor {
    padding: u32,
}

impl FacePreprocessor {
    pub fn new() -> Self {
        Self {
            padding: DEFAULT_FACE_PADDING,
        }
    }

    pub fn with_padding(padding: u32) -> Self {
        Self { padding }
    }

    /// Crop, resize and normalize the landmarked face region.
    ///
    /// The padded bounding box is clamped to the image bounds; a crop that
    /// degenerates to zero area after clamping is an error.
    pub fn face_tensor(
        &self,
        image: &RgbImage,
        landmarks: &LandmarkSet,
    ) -> Result<Array2<f32>, PreprocessError> {
        let img_w = image.width();
        let img_h = image.height();
        if img_w == 0 || img_h == 0 {
            return Err(PreprocessError::EmptyImage {
                width: img_w,
                height: img_h,
            });
        }

        let bbox = landmarks.bounding_box;
        let pad = self.padding as f32;

        let x0 = (bbox.x - pad).max(0.0) as u32;
        let y0 = (bbox.y - pad).max(0.0) as u32;
        let x1 = (bbox.x + bbox.width + pad).min(img_w as f32) as u32;
        let y1 = (bbox.y + bbox.height + pad).min(img_h as f32) as u32;

        if x1 <= x0 || y1 <= y0 {
            return Err(PreprocessError::DegenerateCrop);
        }

        let crop = imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image();
        let resized = imageops::resize(
            &crop,
            FACE_TENSOR_SIZE as u32,
            FACE_TENSOR_SIZE as u32,
            FilterType::Triangle,
        );
        let gray = imageops::grayscale(&resized);

        let mut tensor = Array2::<f32>::zeros((FACE_TENSOR_SIZE, FACE_TENSOR_SIZE));
        for y in 0..FACE_TENSOR_SIZE {
            for x in 0..FACE_TENSOR_SIZE {
                tensor[[y, x]] = gray.get_pixel(x as u32, y as u32).0[0] as f32 / 255.0;
            }
        }

        Ok(tensor)
    }
}

impl Default for FacePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::BoundingBox;
    use image::Rgb;

    fn landmarks_for_box(x: f32, y: f32, w: f32, h: f32) -> LandmarkSet {
        // A minimal set: two corner points spanning the box
        let points = vec![[x, y], [x + w, y + h]];
        LandmarkSet {
            visibility: vec![1.0; points.len()],
            bounding_box: BoundingBox {
                x,
                y,
                width: w,
                height: h,
            },
            points,
        }
    }

    #[test]
    fn test_face_tensor_shape_and_range() {
        let img = RgbImage::from_pixel(100, 100, Rgb([180, 120, 90]));
        let landmarks = landmarks_for_box(20.0, 20.0, 50.0, 50.0);

        let tensor = FacePreprocessor::new().face_tensor(&img, &landmarks).unwrap();
        assert_eq!(tensor.dim(), (FACE_TENSOR_SIZE, FACE_TENSOR_SIZE));
        for &v in tensor.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_face_tensor_clamps_at_image_edge() {
        let img = RgbImage::from_pixel(64, 64, Rgb([200, 200, 200]));
        // Box hanging off the top-left corner
        let landmarks = landmarks_for_box(-10.0, -10.0, 30.0, 30.0);

        let tensor = FacePreprocessor::new().face_tensor(&img, &landmarks).unwrap();
        assert_eq!(tensor.dim(), (FACE_TENSOR_SIZE, FACE_TENSOR_SIZE));
    }

    #[test]
    fn test_face_tensor_box_at_far_edge() {
        let img = RgbImage::from_pixel(64, 64, Rgb([200, 200, 200]));
        // Box hanging off the bottom-right corner
        let landmarks = landmarks_for_box(50.0, 50.0, 40.0, 40.0);

        let result = FacePreprocessor::new().face_tensor(&img, &landmarks);
        assert!(result.is_ok());
    }

    #[test]
    fn test_face_tensor_degenerate_box() {
        let img = RgbImage::from_pixel(64, 64, Rgb([200, 200, 200]));
        // Box entirely outside the image, beyond the padding reach
        let landmarks = landmarks_for_box(200.0, 200.0, 10.0, 10.0);

        let result = FacePreprocessor::with_padding(0).face_tensor(&img, &landmarks);
        assert!(matches!(result, Err(PreprocessError::DegenerateCrop)));
    }

    #[test]
    fn test_face_tensor_normalizes_intensity() {
        // White image should normalize near 1.0, black near 0.0
        let white = RgbImage::from_pixel(80, 80, Rgb([255, 255, 255]));
        let black = RgbImage::from_pixel(80, 80, Rgb([0, 0, 0]));
        let landmarks = landmarks_for_box(10.0, 10.0, 60.0, 60.0);

        let pre = FacePreprocessor::new();
        let white_tensor = pre.face_tensor(&white, &landmarks).unwrap();
        let black_tensor = pre.face_tensor(&black, &landmarks).unwrap();

        assert!(white_tensor.iter().all(|&v| v > 0.99));
        assert!(black_tensor.iter().all(|&v| v < 0.01));
    }

    #[test]
    fn test_face_tensor_zero_area_image() {
        let img = RgbImage::new(0, 0);
        let landmarks = landmarks_for_box(0.0, 0.0, 10.0, 10.0);
        let result = FacePreprocessor::new().face_tensor(&img, &landmarks);
        assert!(matches!(result, Err(PreprocessError::EmptyImage { .. })));
    }
}
