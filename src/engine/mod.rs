//! Transcription engine: lifecycle state machine around one frame loop.

pub mod backend;
pub mod file;
pub mod lifecycle;
pub mod state;
pub mod transcription_loop;

pub use backend::{EngineBackend, LocalBackend, MockBackend};
pub use file::{FileTranscription, transcribe_file, transcribe_source};
pub use lifecycle::TranscriptionEngine;
pub use state::EngineState;
pub use transcription_loop::{LoopExit, LoopSettings, SessionStats};
