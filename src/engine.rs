//! Inference orchestration.
//!
//! The engine owns the classifier handles and decides which path to run from
//! the available inputs: visual-only, audio-only, or fused. Handles live
//! behind a single `RwLock`: inference takes shared reads, reload swaps the
//! whole set under the write lock so readers only ever observe a fully
//! consistent set.

use crate::acoustic::{analyze_speech_patterns, AcousticFeatureVector, FeatureExtractor, SpeechPatterns};
use crate::classifier::{
    AudioClassifier, ClassifierHandle, ClassifierStatus, EmotionLabel, EmotionScores,
    FusionClassifier, ModalityEncoder, SummaryEncoder, VisualClassifier,
};
use crate::config::EngineConfig;
use crate::face::{FacePreprocessor, LandmarkExtractor, LandmarkSet, PreprocessError};
use crate::media::{decode_audio, decode_image, AudioClip, DecodeError};
use crate::spectrogram::SpectrogramBuilder;
use chrono::{DateTime, Utc};
use image::RgbImage;
use ndarray::Array2;
use serde::Serialize;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors surfaced by the inference operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("media decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("at least one of image or audio must be provided")]
    MissingInput,

    #[error("inference failed in stage {stage}: {message}")]
    Inference {
        stage: &'static str,
        message: String,
    },
}

/// Which pipeline produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictSource {
    Video,
    Audio,
    Multimodal,
}

/// Result of one emotion inference. Constructed fresh per call, immutable.
#[derive(Debug, Clone, Serialize)]
pub struct EmotionVerdict {
    pub emotion: EmotionLabel,
    pub confidence: f32,
    pub source: VerdictSource,
    pub distribution: EmotionScores,
    pub landmarks: Option<LandmarkSet>,
    pub audio_features: Option<AcousticFeatureVector>,
    pub timestamp: DateTime<Utc>,
}

impl EmotionVerdict {
    fn from_scores(
        scores: EmotionScores,
        source: VerdictSource,
        landmarks: Option<LandmarkSet>,
        audio_features: Option<AcousticFeatureVector>,
    ) -> Self {
        let (emotion, confidence) = scores.top();
        Self {
            emotion,
            confidence,
            source,
            distribution: scores,
            landmarks,
            audio_features,
            timestamp: Utc::now(),
        }
    }

    /// The explicit no-face fallback verdict
    fn fallback(source: VerdictSource) -> Self {
        Self {
            emotion: EmotionLabel::Neutral,
            confidence: 0.5,
            source,
            distribution: EmotionScores::neutral_fallback(),
            landmarks: None,
            audio_features: None,
            timestamp: Utc::now(),
        }
    }
}

/// Execution backend capability flag, selected once at startup.
///
/// A single in-process CPU backend exists today; the flag is reported via
/// health so callers can tell which backend served their requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeBackend {
    Cpu,
}

impl ComputeBackend {
    pub fn detect() -> Self {
        ComputeBackend::Cpu
    }
}

/// Service health snapshot. Never fails to produce.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// True when every classifier handle reports loaded
    pub ready: bool,
    /// True when any classifier serves untrained parameters
    pub degraded: bool,
    pub backend: ComputeBackend,
    pub classifiers: Vec<ClassifierStatus>,
}

/// The full set of classifier handles, swapped wholesale on reload
struct ClassifierSet {
    visual: ClassifierHandle<VisualClassifier>,
    audio: ClassifierHandle<AudioClassifier>,
    fusion: ClassifierHandle<FusionClassifier>,
}

/// Multimodal emotion inference engine.
///
/// Explicitly constructed with its configuration; owns its classifier
/// handles and all feature extraction state.
pub struct EmotionEngine {
    config: EngineConfig,
    backend: ComputeBackend,
    landmarks: LandmarkExtractor,
    preprocessor: FacePreprocessor,
    features: FeatureExtractor,
    spectrogram: SpectrogramBuilder,
    encoder: Box<dyn ModalityEncoder>,
    classifiers: RwLock<ClassifierSet>,
}

impl EmotionEngine {
    /// Construct an engine with the built-in summary encoder.
    ///
    /// Classifier load failures do not fail construction; they surface
    /// through [`EmotionEngine::health_status`] as non-ready handles.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_encoder(config, Box::new(SummaryEncoder))
    }

    /// Construct an engine with a caller-supplied modality encoder
    pub fn with_encoder(config: EngineConfig, encoder: Box<dyn ModalityEncoder>) -> Self {
        let backend = ComputeBackend::detect();
        info!("Initializing emotion engine ({:?} backend)", backend);

        let classifiers = RwLock::new(Self::load_handles(&config));

        Self {
            landmarks: LandmarkExtractor::new(config.detector.clone()),
            preprocessor: FacePreprocessor::with_padding(config.face_padding),
            features: FeatureExtractor::new(config.mel.sample_rate),
            spectrogram: SpectrogramBuilder::new(config.mel.clone()),
            encoder,
            backend,
            classifiers,
            config,
        }
    }

    /// Detect emotion from whichever modalities are present.
    ///
    /// Image-only runs the visual path (with the neutral fallback when no
    /// face is found), audio-only runs the acoustic path, and both present
    /// attempts the fusion path.
    pub fn detect_emotion(
        &self,
        image: Option<&[u8]>,
        audio: Option<&[u8]>,
        session_id: &str,
    ) -> Result<EmotionVerdict, EngineError> {
        match (image, audio) {
            (None, None) => Err(EngineError::MissingInput),
            (Some(image), None) => {
                let image = decode_image(image)?;
                self.video_path(&image, session_id)
            }
            (None, Some(audio)) => {
                let clip = decode_audio(audio)?;
                self.audio_path(&clip, session_id)
            }
            (Some(image), Some(audio)) => self.detect_multimodal_emotion(image, audio, session_id),
        }
    }

    /// Detect emotion through the fusion path.
    ///
    /// Falls back to the audio-only path when no face is found.
    pub fn detect_multimodal_emotion(
        &self,
        image: &[u8],
        audio: &[u8],
        session_id: &str,
    ) -> Result<EmotionVerdict, EngineError> {
        let image = decode_image(image)?;
        let clip = decode_audio(audio)?;

        let landmarks = match self.landmarks.detect(&image)? {
            Some(landmarks) => landmarks,
            None => {
                debug!(
                    "No face for multimodal request (session {}), falling back to audio",
                    session_id
                );
                return self.audio_path(&clip, session_id);
            }
        };

        let face = self.preprocessor.face_tensor(&image, &landmarks)?;
        let features = self.features.extract(&clip.samples);
        let spectrogram = self.spectrogram.build(&clip.samples);

        let visual_embed = self.encoder.encode_visual(&face);
        let audio_embed = self.encoder.encode_audio(&spectrogram, &features);

        let scores = self.classify_fusion(&visual_embed, &audio_embed)?;
        debug!(
            "Multimodal verdict for session {}: {} ({:.0}%)",
            session_id,
            scores.top().0,
            scores.top().1 * 100.0
        );

        Ok(EmotionVerdict::from_scores(
            scores,
            VerdictSource::Multimodal,
            Some(landmarks),
            Some(features),
        ))
    }

    /// Reload every classifier handle from persisted weights.
    ///
    /// In-flight inferences finish against the old handles; the swap is
    /// exclusive and returns once the new handles are live.
    pub fn reload_classifiers(&self) {
        info!("Reloading classifiers");
        let fresh = Self::load_handles(&self.config);
        let mut guard = self
            .classifiers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = fresh;
    }

    /// Per-classifier status snapshot. Never fails.
    pub fn health_status(&self) -> HealthStatus {
        let guard = self
            .classifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let ready = guard.visual.is_loaded() && guard.audio.is_loaded() && guard.fusion.is_loaded();
        let degraded =
            guard.visual.is_degraded() || guard.audio.is_degraded() || guard.fusion.is_degraded();

        HealthStatus {
            ready,
            degraded,
            backend: self.backend,
            classifiers: vec![
                guard.visual.status(),
                guard.audio.status(),
                guard.fusion.status(),
            ],
        }
    }

    /// Speech-pattern indicators for the wellness collaborator
    pub fn speech_patterns(&self, audio: &[u8]) -> Result<SpeechPatterns, EngineError> {
        let clip = decode_audio(audio)?;
        Ok(analyze_speech_patterns(&clip.samples, clip.sample_rate))
    }

    // --- Pipeline paths ---

    fn video_path(
        &self,
        image: &RgbImage,
        session_id: &str,
    ) -> Result<EmotionVerdict, EngineError> {
        let landmarks = match self.landmarks.detect(image)? {
            Some(landmarks) => landmarks,
            None => {
                debug!(
                    "No face detected for session {}, returning neutral fallback",
                    session_id
                );
                return Ok(EmotionVerdict::fallback(VerdictSource::Video));
            }
        };

        let face = self.preprocessor.face_tensor(image, &landmarks)?;
        let scores = self.classify_visual(&face)?;
        debug!(
            "Video verdict for session {}: {} ({:.0}%)",
            session_id,
            scores.top().0,
            scores.top().1 * 100.0
        );

        Ok(EmotionVerdict::from_scores(
            scores,
            VerdictSource::Video,
            Some(landmarks),
            None,
        ))
    }

    fn audio_path(
        &self,
        clip: &AudioClip,
        session_id: &str,
    ) -> Result<EmotionVerdict, EngineError> {
        let features = self.features.extract(&clip.samples);
        let spectrogram = self.spectrogram.build(&clip.samples);

        let scores = self.classify_audio(&spectrogram)?;
        debug!(
            "Audio verdict for session {} ({:.2}s clip): {} ({:.0}%)",
            session_id,
            clip.duration_secs(),
            scores.top().0,
            scores.top().1 * 100.0
        );

        Ok(EmotionVerdict::from_scores(
            scores,
            VerdictSource::Audio,
            None,
            Some(features),
        ))
    }

    // --- Classifier access under the read lock ---

    fn classify_visual(&self, face: &Array2<f32>) -> Result<EmotionScores, EngineError> {
        let guard = self
            .classifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let model = guard.visual.model().ok_or_else(|| EngineError::Inference {
            stage: "classify_visual",
            message: format!("classifier {} is not loaded", guard.visual.name()),
        })?;
        model.classify(face).map_err(|e| EngineError::Inference {
            stage: "classify_visual",
            message: e.to_string(),
        })
    }

    fn classify_audio(&self, spectrogram: &Array2<f32>) -> Result<EmotionScores, EngineError> {
        let guard = self
            .classifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let model = guard.audio.model().ok_or_else(|| EngineError::Inference {
            stage: "classify_audio",
            message: format!("classifier {} is not loaded", guard.audio.name()),
        })?;
        model
            .classify(spectrogram)
            .map_err(|e| EngineError::Inference {
                stage: "classify_audio",
                message: e.to_string(),
            })
    }

    fn classify_fusion(&self, visual: &[f32], audio: &[f32]) -> Result<EmotionScores, EngineError> {
        let guard = self
            .classifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let model = guard.fusion.model().ok_or_else(|| EngineError::Inference {
            stage: "classify_fusion",
            message: format!("classifier {} is not loaded", guard.fusion.name()),
        })?;
        model
            .classify(visual, audio)
            .map_err(|e| EngineError::Inference {
                stage: "classify_fusion",
                message: e.to_string(),
            })
    }

    // --- Handle loading ---

    fn load_handles(config: &EngineConfig) -> ClassifierSet {
        let weights_dir = match config.resolve_weights_dir() {
            Ok(dir) => Some(dir),
            Err(e) => {
                warn!(
                    "No weights directory available ({}), classifiers load untrained",
                    e
                );
                None
            }
        };
        let dir = weights_dir.as_deref();

        let mut visual = ClassifierHandle::unloaded(VisualClassifier::NAME);
        visual.begin_loading();
        match VisualClassifier::load_or_init(dir) {
            Ok(clf) => {
                let degraded = clf.is_degraded();
                visual.finish_loaded(clf, degraded);
            }
            Err(e) => {
                error!("Failed to load {}: {}", VisualClassifier::NAME, e);
                visual.finish_error(e.to_string());
            }
        }

        let mut audio = ClassifierHandle::unloaded(AudioClassifier::NAME);
        audio.begin_loading();
        match AudioClassifier::load_or_init(dir) {
            Ok(clf) => {
                let degraded = clf.is_degraded();
                audio.finish_loaded(clf, degraded);
            }
            Err(e) => {
                error!("Failed to load {}: {}", AudioClassifier::NAME, e);
                audio.finish_error(e.to_string());
            }
        }

        let mut fusion = ClassifierHandle::unloaded(FusionClassifier::NAME);
        fusion.begin_loading();
        match FusionClassifier::load_or_init(dir) {
            Ok(clf) => {
                let degraded = clf.is_degraded();
                fusion.finish_loaded(clf, degraded);
            }
            Err(e) => {
                error!("Failed to load {}: {}", FusionClassifier::NAME, e);
                fusion.finish_error(e.to_string());
            }
        }

        ClassifierSet {
            visual,
            audio,
            fusion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_verdict_shape() {
        let verdict = EmotionVerdict::fallback(VerdictSource::Video);
        assert_eq!(verdict.emotion, EmotionLabel::Neutral);
        assert!((verdict.confidence - 0.5).abs() < 1e-6);
        assert_eq!(verdict.source, VerdictSource::Video);
        assert!(verdict.landmarks.is_none());
        assert!((verdict.distribution.total() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_verdict_source_serde() {
        assert_eq!(
            serde_json::to_string(&VerdictSource::Multimodal).unwrap(),
            "\"multimodal\""
        );
        assert_eq!(serde_json::to_string(&VerdictSource::Video).unwrap(), "\"video\"");
    }

    #[test]
    fn test_backend_detect() {
        assert_eq!(ComputeBackend::detect(), ComputeBackend::Cpu);
    }
}
