//! Visual emotion classifier over preprocessed face tensors.

use super::network::{load_artifact, save_artifact, DenseNet, NetworkSpec};
use super::{ClassifierError, EmotionLabel, EmotionScores};
use crate::face::FACE_TENSOR_SIZE;
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Hidden layer width
const HIDDEN_DIM: usize = 128;

/// Seed for degraded-mode initialization
const INIT_SEED: u64 = 0x56_49_53;

/// Emotion classifier for 48x48 normalized face tensors
pub struct VisualClassifier {
    net: DenseNet,
    degraded: bool,
}

impl VisualClassifier {
    /// Stable artifact name
    pub const NAME: &'static str = "visual_emotion";

    fn dims() -> Vec<usize> {
        vec![
            FACE_TENSOR_SIZE * FACE_TENSOR_SIZE,
            HIDDEN_DIM,
            EmotionLabel::COUNT,
        ]
    }

    fn weights_path(dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", Self::NAME))
    }

    /// Load persisted weights, or fall back to freshly initialized parameters
    /// when no artifact exists (degraded mode). A present-but-corrupt
    /// artifact is an error.
    pub fn load_or_init(weights_dir: Option<&Path>) -> Result<Self, ClassifierError> {
        let path = weights_dir.map(Self::weights_path);
        match path {
            Some(path) if path.exists() => {
                let spec: NetworkSpec = load_artifact(&path)?;
                let net = DenseNet::from_spec(spec).map_err(|reason| {
                    ClassifierError::CorruptWeights {
                        path: path.clone(),
                        reason,
                    }
                })?;
                if net.dims() != Self::dims() {
                    return Err(ClassifierError::CorruptWeights {
                        path,
                        reason: format!(
                            "unexpected architecture {:?}, expected {:?}",
                            net.dims(),
                            Self::dims()
                        ),
                    });
                }
                info!("Loaded trained weights for {}", Self::NAME);
                Ok(Self {
                    net,
                    degraded: false,
                })
            }
            _ => {
                warn!(
                    "No trained weights for {}, using freshly initialized parameters",
                    Self::NAME
                );
                Ok(Self {
                    net: DenseNet::seeded(&Self::dims(), INIT_SEED),
                    degraded: true,
                })
            }
        }
    }

    /// Persist the current weights under the stable artifact name
    pub fn save(&self, weights_dir: &Path) -> Result<PathBuf, ClassifierError> {
        let path = Self::weights_path(weights_dir);
        save_artifact(&path, &self.net.to_spec())?;
        Ok(path)
    }

    /// Score a face tensor against the emotion label set
    pub fn classify(&self, face: &Array2<f32>) -> Result<EmotionScores, ClassifierError> {
        let (rows, cols) = face.dim();
        if rows != FACE_TENSOR_SIZE || cols != FACE_TENSOR_SIZE {
            return Err(ClassifierError::ShapeMismatch {
                expected: FACE_TENSOR_SIZE * FACE_TENSOR_SIZE,
                got: rows * cols,
            });
        }

        let flat = Array1::from_iter(face.iter().copied());
        let logits = self.net.forward(&flat)?;
        Ok(EmotionScores::from_logits(&logits.to_vec()))
    }

    /// True when serving untrained parameters
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_tensor(value: f32) -> Array2<f32> {
        Array2::from_elem((FACE_TENSOR_SIZE, FACE_TENSOR_SIZE), value)
    }

    #[test]
    fn test_load_without_weights_is_degraded() {
        let clf = VisualClassifier::load_or_init(None).unwrap();
        assert!(clf.is_degraded());
    }

    #[test]
    fn test_classify_distribution_is_total() {
        let clf = VisualClassifier::load_or_init(None).unwrap();
        let scores = clf.classify(&face_tensor(0.5)).unwrap();

        assert!((scores.total() - 1.0).abs() < 1e-6);
        assert_eq!(scores.iter().count(), EmotionLabel::COUNT);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let clf = VisualClassifier::load_or_init(None).unwrap();
        let a = clf.classify(&face_tensor(0.3)).unwrap();
        let b = clf.classify(&face_tensor(0.3)).unwrap();
        assert_eq!(a.top(), b.top());
    }

    #[test]
    fn test_classify_rejects_wrong_shape() {
        let clf = VisualClassifier::load_or_init(None).unwrap();
        let bad = Array2::from_elem((10, 10), 0.5);
        assert!(matches!(
            clf.classify(&bad),
            Err(ClassifierError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_save_then_load_is_trained() {
        let dir = tempfile::tempdir().unwrap();

        let clf = VisualClassifier::load_or_init(None).unwrap();
        clf.save(dir.path()).unwrap();

        let reloaded = VisualClassifier::load_or_init(Some(dir.path())).unwrap();
        assert!(!reloaded.is_degraded());

        // Same weights produce the same prediction
        let input = face_tensor(0.7);
        assert_eq!(
            clf.classify(&input).unwrap().top(),
            reloaded.classify(&input).unwrap().top()
        );
    }

    #[test]
    fn test_corrupt_weights_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{}.json", VisualClassifier::NAME));
        std::fs::write(&path, "garbage").unwrap();

        let result = VisualClassifier::load_or_init(Some(dir.path()));
        assert!(matches!(result, Err(ClassifierError::CorruptWeights { .. })));
    }

    #[test]
    fn test_wrong_architecture_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{}.json", VisualClassifier::NAME));

        // A valid network of the wrong shape
        let other = DenseNet::seeded(&[4, 2], 0);
        save_artifact(&path, &other.to_spec()).unwrap();

        let result = VisualClassifier::load_or_init(Some(dir.path()));
        assert!(matches!(result, Err(ClassifierError::CorruptWeights { .. })));
    }
}
