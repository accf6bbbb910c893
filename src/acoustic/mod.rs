//! Acoustic analysis: fixed-length feature descriptors and speech patterns.
//!
//! The primary extractor computes the descriptor vector consumed by the
//! audio classification path; the speech-pattern analysis is a secondary
//! surface consumed only by the wellness collaborator.

mod features;
mod speech_patterns;

pub use features::{AcousticFeatureVector, FeatureExtractor, N_CHROMA, N_MFCC};
pub use speech_patterns::{analyze_speech_patterns, SpeechPatterns};

pub(crate) use features::pitch_stats;
