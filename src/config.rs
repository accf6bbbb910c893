//! Engine configuration and JSON persistence.

use crate::face::landmarks::DetectorConfig;
use crate::face::preprocess::DEFAULT_FACE_PADDING;
use crate::spectrogram::MelConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Engine-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub schema_version: u32,

    /// Directory holding classifier weight artifacts. Defaults to
    /// `~/.sentia/weights` when unset. Absent artifacts are not fatal.
    pub weights_dir: Option<PathBuf>,

    /// Padding around the landmark bounding box when cropping faces (pixels)
    pub face_padding: u32,

    /// Face detector tunables
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Mel spectrogram configuration for the audio path
    #[serde(default)]
    pub mel: MelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            weights_dir: None,
            face_padding: DEFAULT_FACE_PADDING,
            detector: DetectorConfig::default(),
            mel: MelConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".sentia"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Resolve the weights directory (configured or default)
    pub fn resolve_weights_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.weights_dir {
            Ok(dir.clone())
        } else {
            Ok(Self::config_dir()?.join("weights"))
        }
    }

    /// Load config from file or return default
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using default: {}", e);
                Self::default()
            }
        }
    }

    /// Load config from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: EngineConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.face_padding, 20);
        assert!(config.weights_dir.is_none());
        assert_eq!(config.mel.n_mels, 128);
        assert_eq!(config.mel.n_frames, 128);
    }

    #[test]
    fn test_config_dir() {
        let path = EngineConfig::config_dir().unwrap();
        assert!(path.to_string_lossy().contains(".sentia"));
    }

    #[test]
    fn test_resolve_weights_dir_custom() {
        let config = EngineConfig {
            weights_dir: Some(PathBuf::from("/custom/weights")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_weights_dir().unwrap(),
            PathBuf::from("/custom/weights")
        );
    }

    #[test]
    fn test_resolve_weights_dir_default() {
        let config = EngineConfig::default();
        let dir = config.resolve_weights_dir().unwrap();
        assert!(dir.to_string_lossy().ends_with("weights"));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.schema_version, config.schema_version);
        assert_eq!(restored.face_padding, config.face_padding);
        assert_eq!(restored.mel.n_fft, config.mel.n_fft);
    }
}
