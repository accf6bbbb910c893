//! Multimodal fusion classifier.
//!
//! Combines per-modality summary vectors by projecting each into a shared
//! latent space, concatenating, and classifying. Used only when both
//! modalities are present and a face was detected.

use super::network::{load_artifact, relu, save_artifact, DenseLayer, DenseNet, LayerSpec, NetworkSpec};
use super::{ClassifierError, EmotionLabel, EmotionScores};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Fixed length of the visual summary vector
pub const VISUAL_EMBED_DIM: usize = 512;

/// Fixed length of the audio summary vector
pub const AUDIO_EMBED_DIM: usize = 128;

/// Shared latent space each modality projects into
const LATENT_DIM: usize = 256;

/// Hidden width of the classification head
const HEAD_HIDDEN: usize = 256;

/// Seed for degraded-mode initialization
const INIT_SEED: u64 = 0x46_55_53;

/// Serialized form of the fusion classifier
#[derive(Debug, Serialize, Deserialize)]
struct FusionSpec {
    visual_proj: LayerSpec,
    audio_proj: LayerSpec,
    head: NetworkSpec,
}

/// Joint classifier over encoded modality summaries
pub struct FusionClassifier {
    visual_proj: DenseLayer,
    audio_proj: DenseLayer,
    head: DenseNet,
    degraded: bool,
}

impl FusionClassifier {
    /// Stable artifact name
    pub const NAME: &'static str = "multimodal_fusion";

    fn weights_path(dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", Self::NAME))
    }

    fn seeded() -> Self {
        let mut rng = StdRng::seed_from_u64(INIT_SEED);
        Self {
            visual_proj: DenseLayer::seeded(&mut rng, VISUAL_EMBED_DIM, LATENT_DIM),
            audio_proj: DenseLayer::seeded(&mut rng, AUDIO_EMBED_DIM, LATENT_DIM),
            head: DenseNet::seeded(
                &[LATENT_DIM * 2, HEAD_HIDDEN, EmotionLabel::COUNT],
                INIT_SEED.wrapping_add(1),
            ),
            degraded: true,
        }
    }

    fn from_spec(spec: FusionSpec, path: &Path) -> Result<Self, ClassifierError> {
        let corrupt = |reason: String| ClassifierError::CorruptWeights {
            path: path.to_path_buf(),
            reason,
        };

        let visual_proj = DenseLayer::from_spec(spec.visual_proj).map_err(&corrupt)?;
        let audio_proj = DenseLayer::from_spec(spec.audio_proj).map_err(&corrupt)?;
        let head = DenseNet::from_spec(spec.head).map_err(&corrupt)?;

        if visual_proj.input_dim() != VISUAL_EMBED_DIM
            || audio_proj.input_dim() != AUDIO_EMBED_DIM
            || visual_proj.output_dim() != LATENT_DIM
            || audio_proj.output_dim() != LATENT_DIM
            || head.input_dim() != LATENT_DIM * 2
            || head.output_dim() != EmotionLabel::COUNT
        {
            return Err(corrupt("unexpected fusion architecture".to_string()));
        }

        Ok(Self {
            visual_proj,
            audio_proj,
            head,
            degraded: false,
        })
    }

    /// Load persisted weights, or fall back to freshly initialized parameters
    /// when no artifact exists (degraded mode). A present-but-corrupt
    /// artifact is an error.
    pub fn load_or_init(weights_dir: Option<&Path>) -> Result<Self, ClassifierError> {
        let path = weights_dir.map(Self::weights_path);
        match path {
            Some(path) if path.exists() => {
                let spec: FusionSpec = load_artifact(&path)?;
                let fusion = Self::from_spec(spec, &path)?;
                info!("Loaded trained weights for {}", Self::NAME);
                Ok(fusion)
            }
            _ => {
                warn!(
                    "No trained weights for {}, using freshly initialized parameters",
                    Self::NAME
                );
                Ok(Self::seeded())
            }
        }
    }

    /// Persist the current weights under the stable artifact name
    pub fn save(&self, weights_dir: &Path) -> Result<PathBuf, ClassifierError> {
        let path = Self::weights_path(weights_dir);
        let spec = FusionSpec {
            visual_proj: self.visual_proj.to_spec(),
            audio_proj: self.audio_proj.to_spec(),
            head: self.head.to_spec(),
        };
        save_artifact(&path, &spec)?;
        Ok(path)
    }

    /// Score a pair of modality summaries against the emotion label set
    pub fn classify(&self, visual: &[f32], audio: &[f32]) -> Result<EmotionScores, ClassifierError> {
        if visual.len() != VISUAL_EMBED_DIM {
            return Err(ClassifierError::ShapeMismatch {
                expected: VISUAL_EMBED_DIM,
                got: visual.len(),
            });
        }
        if audio.len() != AUDIO_EMBED_DIM {
            return Err(ClassifierError::ShapeMismatch {
                expected: AUDIO_EMBED_DIM,
                got: audio.len(),
            });
        }

        let v = relu(self.visual_proj.forward(&Array1::from_vec(visual.to_vec())));
        let a = relu(self.audio_proj.forward(&Array1::from_vec(audio.to_vec())));

        let fused = Array1::from_iter(v.iter().chain(a.iter()).copied());
        let logits = self.head.forward(&fused)?;
        Ok(EmotionScores::from_logits(&logits.to_vec()))
    }

    /// True when serving untrained parameters
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}
