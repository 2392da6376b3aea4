//! Transcript event model shared by the engine, sinks and the CLI.

use serde::{Deserialize, Serialize};

/// Notification emitted by the engine to its consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEvent {
    /// Model and device are loaded; `start` may be called
    Ready,
    /// Something failed; the message is human-readable
    Error { message: String },
    /// Recording began
    Start,
    /// A stop was requested
    Stop,
    /// The transcription loop exited
    End,
    /// Best guess for the utterance in progress
    Partial { text: String },
    /// An utterance finished
    Final { text: String },
    /// Trailing text flushed after the loop exited
    FinalResult { text: String },
}

impl TranscriptEvent {
    /// Stable snake_case name, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            TranscriptEvent::Ready => "ready",
            TranscriptEvent::Error { .. } => "error",
            TranscriptEvent::Start => "start",
            TranscriptEvent::Stop => "stop",
            TranscriptEvent::End => "end",
            TranscriptEvent::Partial { .. } => "partial",
            TranscriptEvent::Final { .. } => "final",
            TranscriptEvent::FinalResult { .. } => "final_result",
        }
    }

    /// Text payload for transcript-carrying events.
    pub fn text(&self) -> Option<&str> {
        match self {
            TranscriptEvent::Partial { text }
            | TranscriptEvent::Final { text }
            | TranscriptEvent::FinalResult { text } => Some(text),
            _ => None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        TranscriptEvent::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
