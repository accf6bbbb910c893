//! Emotion classification: label set, probability distributions, inference
//! networks and classifier lifecycle handles.
//!
//! All classifiers share one closed label set and produce total probability
//! distributions over it. Weights load from JSON artifacts addressed by a
//! stable classifier name; a missing artifact yields a degraded
//! freshly-initialized classifier, a corrupt one is a startup failure.

pub mod audio;
pub mod encoder;
pub mod fusion;
mod network;
pub mod visual;

pub use audio::AudioClassifier;
pub use encoder::{ModalityEncoder, SummaryEncoder};
pub use fusion::{FusionClassifier, AUDIO_EMBED_DIM, VISUAL_EMBED_DIM};
pub use visual::VisualClassifier;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Version reported for all classifier artifacts
pub const MODEL_VERSION: &str = "1.0.0";

/// Errors that can occur during classifier loading and inference
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("corrupt weights at {path}: {reason}")]
    CorruptWeights { path: PathBuf, reason: String },

    #[error("input shape mismatch: expected {expected} values, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("failed to persist weights to {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

/// The fixed emotion vocabulary shared by every classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl EmotionLabel {
    /// Number of labels in the set
    pub const COUNT: usize = 7;

    /// Canonical iteration order; arg-max ties resolve to the first entry
    pub const ALL: [EmotionLabel; EmotionLabel::COUNT] = [
        EmotionLabel::Angry,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Neutral,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Angry => "angry",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Surprise => "surprise",
        }
    }

    /// Position in the canonical order
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A total probability distribution over the emotion label set.
///
/// Every label has an entry and values sum to 1.0 within floating tolerance;
/// the softmax producer guarantees both.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionScores([f32; EmotionLabel::COUNT]);

impl EmotionScores {
    /// Softmax over raw logits. Producers pass exactly [`EmotionLabel::COUNT`]
    /// values in canonical label order.
    pub fn from_logits(logits: &[f32]) -> Self {
        let mut values = [0.0f32; EmotionLabel::COUNT];
        for (dst, src) in values.iter_mut().zip(logits.iter()) {
            *dst = *src;
        }

        let max = values.iter().cloned().fold(f32::MIN, f32::max);
        let mut sum = 0.0f32;
        for v in values.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        for v in values.iter_mut() {
            *v /= sum;
        }

        Self(values)
    }

    /// Uniform distribution
    pub fn uniform() -> Self {
        Self([1.0 / EmotionLabel::COUNT as f32; EmotionLabel::COUNT])
    }

    /// Fallback distribution for the no-face verdict: neutral at 0.5,
    /// remainder spread evenly
    pub fn neutral_fallback() -> Self {
        let rest = 0.5 / (EmotionLabel::COUNT - 1) as f32;
        let mut values = [rest; EmotionLabel::COUNT];
        values[EmotionLabel::Neutral.index()] = 0.5;
        Self(values)
    }

    /// Probability assigned to a label
    pub fn get(&self, label: EmotionLabel) -> f32 {
        self.0[label.index()]
    }

    /// Arg-max label and its probability; ties resolve to the first label in
    /// canonical order
    pub fn top(&self) -> (EmotionLabel, f32) {
        let mut best = EmotionLabel::ALL[0];
        let mut best_p = self.0[0];
        for &label in &EmotionLabel::ALL[1..] {
            let p = self.get(label);
            if p > best_p {
                best = label;
                best_p = p;
            }
        }
        (best, best_p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, f32)> + '_ {
        EmotionLabel::ALL.iter().map(move |&l| (l, self.get(l)))
    }

    /// Sum over all entries (1.0 within floating tolerance)
    pub fn total(&self) -> f32 {
        self.0.iter().sum()
    }
}

impl Serialize for EmotionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(EmotionLabel::COUNT))?;
        for (label, p) in self.iter() {
            map.serialize_entry(label.as_str(), &p)?;
        }
        map.end()
    }
}

/// Lifecycle state of a classifier handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ClassifierState {
    NotLoaded,
    Loading,
    Loaded {
        /// True when serving freshly initialized (untrained) parameters
        degraded: bool,
    },
    Error {
        message: String,
    },
}

/// Status snapshot of a classifier handle
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierStatus {
    pub name: String,
    pub version: String,
    #[serde(flatten)]
    pub state: ClassifierState,
    pub last_updated: DateTime<Utc>,
}

/// A loaded, ready-to-run classifier plus its lifecycle status.
///
/// Owned exclusively by the orchestrator; loaded once at startup and swapped
/// wholesale on reload.
#[derive(Debug)]
pub struct ClassifierHandle<T> {
    name: &'static str,
    state: ClassifierState,
    last_updated: DateTime<Utc>,
    model: Option<T>,
}

impl<T> ClassifierHandle<T> {
    pub fn unloaded(name: &'static str) -> Self {
        Self {
            name,
            state: ClassifierState::NotLoaded,
            last_updated: Utc::now(),
            model: None,
        }
    }

    pub fn begin_loading(&mut self) {
        self.state = ClassifierState::Loading;
        self.last_updated = Utc::now();
    }

    pub fn finish_loaded(&mut self, model: T, degraded: bool) {
        self.model = Some(model);
        self.state = ClassifierState::Loaded { degraded };
        self.last_updated = Utc::now();
    }

    pub fn finish_error(&mut self, message: String) {
        self.model = None;
        self.state = ClassifierState::Error { message };
        self.last_updated = Utc::now();
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn model(&self) -> Option<&T> {
        self.model.as_ref()
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ClassifierState::Loaded { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.state, ClassifierState::Loaded { degraded: true })
    }

    pub fn status(&self) -> ClassifierStatus {
        ClassifierStatus {
            name: self.name.to_string(),
            version: MODEL_VERSION.to_string(),
            state: self.state.clone(),
            last_updated: self.last_updated,
        }
    }
}
