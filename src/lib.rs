//! voxeval - Streaming speech transcription engine
//!
//! Reads fixed-size PCM frames from an audio source, feeds them to an
//! offline recognizer and publishes partial and final transcripts as events.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod events;
pub mod output;
pub mod stt;

// Composition root for the binary
#[cfg(feature = "cli")]
pub mod app;

// Core traits (source → recognize → events)
pub use audio::AudioSource;
pub use engine::EngineBackend;
pub use events::EventSink;
pub use stt::Recognizer;

// Engine
pub use engine::{EngineState, FileTranscription, SessionStats, TranscriptionEngine};
pub use events::{EventBus, TranscriptEvent};

// Error handling
pub use error::{Result, VoxevalError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
