use crate::defaults;
use crate::error::{Result, VoxevalError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub audio: AudioConfig,
    pub engine: EngineConfig,
}

/// Recognizer model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory of the model bundle
    pub path: PathBuf,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub frame_size: usize,
}

/// Transcription engine timing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub stop_grace_ms: u64,
    pub short_read_backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            frame_size: defaults::FRAME_SIZE,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stop_grace_ms: defaults::STOP_GRACE_MS,
            short_read_backoff_ms: defaults::SHORT_READ_BACKOFF_MS,
        }
    }
}

impl EngineConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn short_read_backoff(&self) -> Duration {
        Duration::from_millis(self.short_read_backoff_ms)
    }
}

/// Well-known model location: `<downloads>/vosk/models/<model>`.
pub fn default_model_path() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(defaults::MODELS_SUBDIR)
        .join(defaults::DEFAULT_MODEL_NAME)
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxevalError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                VoxevalError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(VoxevalError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXEVAL_MODEL_PATH → model.path
    /// - VOXEVAL_AUDIO_DEVICE → audio.device
    /// - VOXEVAL_FRAME_SIZE → audio.frame_size (ignored unless numeric)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("VOXEVAL_MODEL_PATH")
            && !path.is_empty()
        {
            self.model.path = PathBuf::from(path);
        }

        if let Ok(device) = std::env::var("VOXEVAL_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(frame_size) = std::env::var("VOXEVAL_FRAME_SIZE")
            && let Ok(frame_size) = frame_size.trim().parse::<usize>()
        {
            self.audio.frame_size = frame_size;
        }

        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(VoxevalError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.frame_size == 0 {
            return Err(VoxevalError::ConfigInvalidValue {
                key: "audio.frame_size".to_string(),
                message: "must be positive".to_string(),
            });
        }
        // stop() lets the in-flight frame finish, so the grace must cover one
        let frame_ms = defaults::frame_duration_ms(self.audio.frame_size, self.audio.sample_rate);
        if self.engine.stop_grace_ms <= frame_ms {
            return Err(VoxevalError::ConfigInvalidValue {
                key: "engine.stop_grace_ms".to_string(),
                message: format!(
                    "must exceed one frame ({} ms for {} samples at {} Hz)",
                    frame_ms, self.audio.frame_size, self.audio.sample_rate
                ),
            });
        }
        Ok(())
    }

    /// Serialize the effective configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VoxevalError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxeval/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxeval")
            .join("config.toml")
    }
}
