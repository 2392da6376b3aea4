//! Error types for voxeval.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxevalError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Model errors
    #[error("Model creation failed: {path} does not exist.")]
    ModelMissing { path: String },

    #[error("Model loading failed: {message}")]
    ModelLoad { message: String },

    // Engine lifecycle errors
    #[error("Engine is not initialized")]
    NotInitialized,

    #[error("Engine has been destroyed")]
    EngineDestroyed,

    #[error("Engine is busy ({state})")]
    EngineBusy { state: String },

    #[error("Transcription loop did not finish within {grace_ms}ms")]
    StopTimeout { grace_ms: u64 },

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio device read failed: {message}")]
    DeviceRead { message: String },

    // Recognition errors
    #[error("Recognizer error: {message}")]
    Recognizer { message: String },

    #[error("Malformed recognizer output: {message}")]
    MalformedRecognizerOutput { message: String },

    #[error("{component} backend unavailable: rebuild with the `{feature}` feature")]
    BackendUnavailable {
        component: &'static str,
        feature: &'static str,
    },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxevalError>;
