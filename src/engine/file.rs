//! Offline transcription of recorded audio.

use crate::audio::{AudioSource, WavAudioSource};
use crate::engine::transcription_loop::{LoopExit, LoopSettings, SessionStats, run_frames};
use crate::error::{Result, VoxevalError};
use crate::events::TranscriptEvent;
use crate::stt::Recognizer;
use crate::stt::result::flush_text;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::info;

/// Outcome of transcribing one recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileTranscription {
    pub filename: String,
    /// Utterances and trailing text joined with single spaces.
    pub transcription: String,
    pub utterances: Vec<String>,
    #[serde(skip)]
    pub stats: SessionStats,
}

/// Run the frame loop over a finite source on the calling thread.
///
/// The recognizer is reset first so text from an earlier file cannot
/// leak into this one.
pub fn transcribe_source(
    recognizer: &mut dyn Recognizer,
    source: &mut dyn AudioSource,
    filename: &str,
    frame_size: usize,
) -> Result<FileTranscription> {
    if !source.is_finite() {
        return Err(VoxevalError::Other(format!(
            "{filename}: offline transcription needs a finite source"
        )));
    }

    let settings = LoopSettings {
        frame_size,
        short_read_backoff: Duration::ZERO,
    };
    let never = AtomicBool::new(false);
    let mut utterances = Vec::new();

    recognizer.reset();
    source.start()?;
    let (exit, stats) = run_frames(recognizer, source, &never, &settings, &mut |event| {
        if let TranscriptEvent::Final { text } = event
            && !text.trim().is_empty()
        {
            utterances.push(text.trim().to_string());
        }
    });
    source.stop()?;

    if let LoopExit::DeviceError(message) = exit {
        return Err(VoxevalError::DeviceRead { message });
    }

    let trailing = flush_text(recognizer);
    if !trailing.trim().is_empty() {
        utterances.push(trailing.trim().to_string());
    }

    info!(
        "{filename}: {} frames, {} utterances",
        stats.frames,
        utterances.len()
    );

    Ok(FileTranscription {
        filename: filename.to_string(),
        transcription: utterances.join(" "),
        utterances,
        stats,
    })
}

/// Transcribe a 16-bit PCM WAV file; other rates and channel layouts are
/// converted to 16 kHz mono first.
pub fn transcribe_file(
    recognizer: &mut dyn Recognizer,
    path: &Path,
    frame_size: usize,
) -> Result<FileTranscription> {
    let mut source = WavAudioSource::open(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    transcribe_source(recognizer, &mut source, &filename, frame_size)
}
