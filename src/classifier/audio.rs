//! Audio emotion classifier over mel spectrogram tensors.

use super::network::{load_artifact, save_artifact, DenseNet, NetworkSpec};
use super::{ClassifierError, EmotionLabel, EmotionScores};
use ndarray::{Array2, Axis};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Expected mel band count; matches `MelConfig::default().n_mels`
const INPUT_BANDS: usize = 128;

/// Hidden layer width
const HIDDEN_DIM: usize = 64;

/// Seed for degraded-mode initialization
const INIT_SEED: u64 = 0x41_55_44;

/// Emotion classifier for fixed-shape log-mel spectrograms.
///
/// The spectrogram is mean-pooled over the time axis before the dense head;
/// the external contract is the full fixed-shape tensor.
pub struct AudioClassifier {
    net: DenseNet,
    degraded: bool,
}

impl AudioClassifier {
    /// Stable artifact name
    pub const NAME: &'static str = "audio_emotion";

    fn dims() -> Vec<usize> {
        vec![INPUT_BANDS, HIDDEN_DIM, EmotionLabel::COUNT]
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

    /// Score a spectrogram tensor against the emotion label set
    pub fn classify(&self, spectrogram: &Array2<f32>) -> Result<EmotionScores, ClassifierError> {
        let (bands, frames) = spectrogram.dim();
        if bands != INPUT_BANDS || frames == 0 {
            return Err(ClassifierError::ShapeMismatch {
                expected: INPUT_BANDS,
                got: bands,
            });
        }

        let pooled = spectrogram
            .mean_axis(Axis(1))
            .ok_or(ClassifierError::ShapeMismatch {
                expected: INPUT_BANDS,
                got: 0,
            })?;
        let logits = self.net.forward(&pooled)?;
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

    fn spectrogram(value: f32) -> Array2<f32> {
        Array2::from_elem((INPUT_BANDS, 128), value)
    }

    #[test]
    fn test_load_without_weights_is_degraded() {
        let clf = AudioClassifier::load_or_init(None).unwrap();
        assert!(clf.is_degraded());
    }

    #[test]
    fn test_classify_distribution_is_total() {
        let clf = AudioClassifier::load_or_init(None).unwrap();
        let scores = clf.classify(&spectrogram(0.2)).unwrap();

        assert!((scores.total() - 1.0).abs() < 1e-6);
        assert_eq!(scores.iter().count(), EmotionLabel::COUNT);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let clf = AudioClassifier::load_or_init(None).unwrap();
        let a = clf.classify(&spectrogram(-0.4)).unwrap();
        let b = clf.classify(&spectrogram(-0.4)).unwrap();
        assert_eq!(a.top(), b.top());
    }

    #[test]
    fn test_classify_rejects_wrong_band_count() {
        let clf = AudioClassifier::load_or_init(None).unwrap();
        let bad = Array2::from_elem((64, 128), 0.0);
        assert!(matches!(
            clf.classify(&bad),
            Err(ClassifierError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_save_then_load_is_trained() {
        let dir = tempfile::tempdir().unwrap();

        let clf = AudioClassifier::load_or_init(None).unwrap();
        clf.save(dir.path()).unwrap();

        let reloaded = AudioClassifier::load_or_init(Some(dir.path())).unwrap();
        assert!(!reloaded.is_degraded());
    }

    #[test]
    fn test_corrupt_weights_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{}.json", AudioClassifier::NAME));
        std::fs::write(&path, "[1, 2, 3").unwrap();

        let result = AudioClassifier::load_or_init(Some(dir.path()));
        assert!(matches!(result, Err(ClassifierError::CorruptWeights { .. })));
    }
}
