//! Multimodal emotion inference engine.
//!
//! Ingests a still image and/or an audio clip and produces an emotion
//! classification over a fixed 7-way label set, optionally fused across
//! modalities. The engine decodes raw media, extracts perceptual features
//! (facial landmarks, acoustic descriptors), normalizes them into
//! fixed-shape tensors, runs per-modality classifiers and combines the
//! outputs into a single verdict with a confidence score.
//!
//! The surrounding service layer (transport, conversational support,
//! wellness aggregation) consumes the engine through
//! [`EmotionEngine::detect_emotion`], [`EmotionEngine::detect_multimodal_emotion`],
//! [`EmotionEngine::reload_classifiers`] and [`EmotionEngine::health_status`].

pub mod acoustic;
pub mod classifier;
pub mod config;
mod dsp;
pub mod engine;
pub mod face;
pub mod media;
pub mod spectrogram;


pub use classifier::{ClassifierState, ClassifierStatus, EmotionLabel, EmotionScores};
pub use config::EngineConfig;
pub use engine::{
    ComputeBackend, EmotionEngine, EmotionVerdict, EngineError, HealthStatus, VerdictSource,
};
