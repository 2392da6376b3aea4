//! Command-line application flows.
//!
//! Wires the engine, its backend and event sinks together for the
//! `listen` and `transcribe` commands.

use crate::config::Config;
use crate::engine::{EngineBackend, LocalBackend, TranscriptionEngine, transcribe_file};
use crate::error::{Result, VoxevalError};
use crate::events::{CollectorSink, EventSink, JsonLinesSink, RenderSink, spawn_sink};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// One line typed on stdin during `listen`.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Start,
    Stop,
    Toggle,
    Quit,
    Unknown(String),
}

pub fn parse_control(line: &str) -> Control {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => Control::Toggle,
        "start" | "s" => Control::Start,
        "stop" | "x" => Control::Stop,
        "quit" | "q" | "exit" => Control::Quit,
        other => Control::Unknown(other.to_string()),
    }
}

/// Apply command-line overrides on top of file and environment config.
pub fn apply_overrides(mut config: Config, model: Option<PathBuf>, device: Option<String>) -> Config {
    if let Some(model) = model {
        config.model.path = model;
    }
    if let Some(device) = device {
        config.audio.device = Some(device);
    }
    config
}

/// Drive `engine` from control lines until `quit` or end of input.
///
/// Lifecycle failures are reported and the session continues; the engine
/// also reports them as `Error` events where applicable.
pub fn drive_from_commands<R: BufRead>(engine: &TranscriptionEngine, input: R) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        let outcome = match parse_control(&line) {
            Control::Start => engine.start(),
            Control::Stop => engine.stop(),
            Control::Toggle if engine.is_recording() => engine.stop(),
            Control::Toggle => engine.start(),
            Control::Quit => break,
            Control::Unknown(command) => {
                warn!("unknown command {command:?}; expected start, stop or quit");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            warn!("{e}");
        }
    }
    debug!("control input closed");
    Ok(())
}

fn spawn_sinks(
    engine: &TranscriptionEngine,
    json: bool,
    quiet: bool,
) -> Result<Vec<JoinHandle<Option<String>>>> {
    let mut sinks: Vec<Box<dyn EventSink>> = Vec::new();
    if json {
        sinks.push(Box::new(JsonLinesSink::stdout()));
    } else {
        if !quiet {
            sinks.push(Box::new(RenderSink::new(true)));
        }
        sinks.push(Box::new(CollectorSink::new()));
    }

    let mut handles = Vec::with_capacity(sinks.len());
    for sink in sinks {
        handles.push(spawn_sink(engine.subscribe(), sink)?);
    }
    Ok(handles)
}

/// Live transcription with an explicit engine (any backend).
///
/// With `duration` the engine records once for that long; otherwise it is
/// driven by `input`. Returns the collected transcript, if any.
pub fn run_listen_with<R: BufRead>(
    engine: TranscriptionEngine,
    json: bool,
    quiet: bool,
    duration: Option<Duration>,
    input: R,
) -> Result<Option<String>> {
    let sinks = spawn_sinks(&engine, json, quiet)?;

    let session = engine.initialize().and_then(|()| match duration {
        Some(duration) => {
            engine.start()?;
            thread::sleep(duration);
            engine.stop()
        }
        None => drive_from_commands(&engine, input),
    });

    // Closes the event bus, which ends every sink thread
    if let Err(e) = engine.destroy() {
        warn!("{e}");
    }

    let mut transcript = None;
    for handle in sinks {
        match handle.join() {
            Ok(Some(text)) => transcript = Some(text),
            Ok(None) => {}
            Err(_) => warn!("sink thread panicked"),
        }
    }

    session.map(|()| transcript)
}

/// `voxeval listen`: microphone transcription with the local backend.
pub fn run_listen(config: Config, json: bool, quiet: bool, duration: Option<Duration>) -> Result<()> {
    let engine = TranscriptionEngine::new(config, Box::new(LocalBackend));
    let stdin = std::io::stdin();
    if duration.is_none() && !quiet && !json {
        eprintln!("Type start, stop or quit (empty line toggles recording)");
    }

    if let Some(transcript) = run_listen_with(engine, json, quiet, duration, stdin.lock())? {
        println!("{transcript}");
    }
    Ok(())
}

/// Transcribe `files` one by one, writing a line per file to `out`.
///
/// Returns the number of files that failed; each failure is logged and
/// does not stop the remaining files.
pub fn run_transcribe_with(
    backend: &dyn EngineBackend,
    config: &Config,
    files: &[PathBuf],
    json: bool,
    out: &mut dyn Write,
) -> Result<usize> {
    let model_path = &config.model.path;
    if !model_path.exists() {
        return Err(VoxevalError::ModelMissing {
            path: model_path.display().to_string(),
        });
    }
    let mut recognizer = backend.load_recognizer(model_path, config.audio.sample_rate)?;

    let mut failures = 0;
    for path in files {
        match transcribe_file(recognizer.as_mut(), path, config.audio.frame_size) {
            Ok(result) if json => {
                let line = serde_json::to_string(&result)
                    .map_err(|e| VoxevalError::Other(e.to_string()))?;
                writeln!(out, "{line}")?;
            }
            Ok(result) => writeln!(out, "{}: {}", result.filename, result.transcription)?,
            Err(e) => {
                failures += 1;
                warn!("{}: {e}", display_name(path));
            }
        }
    }
    Ok(failures)
}

/// `voxeval transcribe`: offline WAV transcription with the local backend.
pub fn run_transcribe(config: &Config, files: &[PathBuf], json: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let failures = run_transcribe_with(&LocalBackend, config, files, json, &mut stdout.lock())?;
    if failures > 0 {
        return Err(VoxevalError::Other(format!(
            "{failures} of {} file(s) failed",
            files.len()
        )));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioSource;
    use crate::engine::MockBackend;
    use crate::stt::MockRecognizer;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn mock_engine(model_dir: &TempDir, recognizer: MockRecognizer) -> TranscriptionEngine {
        let mut config = Config::default();
        config.model.path = model_dir.path().to_path_buf();
        config.audio.frame_size = 64;
        config.engine.short_read_backoff_ms = 1;
        let audio = MockAudioSource::new().with_read_delay(Duration::from_millis(2));
        TranscriptionEngine::new(config, Box::new(MockBackend::new(recognizer, audio)))
    }

    #[test]
    fn parse_control_commands() {
        assert_eq!(parse_control("start"), Control::Start);
        assert_eq!(parse_control("  STOP \n"), Control::Stop);
        assert_eq!(parse_control(""), Control::Toggle);
        assert_eq!(parse_control("q"), Control::Quit);
        assert_eq!(
            parse_control("pause"),
            Control::Unknown("pause".to_string())
        );
    }

    #[test]
    fn apply_overrides_replaces_model_and_device() {
        let config = apply_overrides(
            Config::default(),
            Some(PathBuf::from("/models/en")),
            Some("USB Mic".to_string()),
        );
        assert_eq!(config.model.path, PathBuf::from("/models/en"));
        assert_eq!(config.audio.device.as_deref(), Some("USB Mic"));

        let untouched = apply_overrides(Config::default(), None, None);
        assert_eq!(untouched, Config::default());
    }

    #[test]
    fn drive_from_commands_toggles_engine() {
        let model_dir = TempDir::new().unwrap();
        let engine = mock_engine(&model_dir, MockRecognizer::new("m"));
        engine.initialize().unwrap();
        let rx = engine.subscribe();

        drive_from_commands(&engine, Cursor::new("\nstop\nbogus\nstart\n\nquit\nstart\n")).unwrap();

        assert!(!engine.is_recording());
        let starts = rx
            .try_iter()
            .filter(|e| *e == crate::events::TranscriptEvent::Start)
            .count();
        assert_eq!(starts, 2);
    }

    #[test]
    fn run_listen_with_collects_transcript() {
        let model_dir = TempDir::new().unwrap();
        let engine = mock_engine(&model_dir, MockRecognizer::new("m").with_boundary_every(2));

        let transcript = run_listen_with(
            engine,
            false,
            true,
            Some(Duration::from_millis(50)),
            Cursor::new(""),
        )
        .unwrap();

        let transcript = transcript.unwrap();
        assert!(transcript.starts_with("word1 word2"));
    }

    #[test]
    fn run_listen_with_missing_model_fails() {
        let config = apply_overrides(Config::default(), Some("/nonexistent/model".into()), None);
        let engine = TranscriptionEngine::new(config, Box::new(MockBackend::default()));

        let result = run_listen_with(engine, false, true, None, Cursor::new("start\n"));

        assert!(matches!(result, Err(VoxevalError::ModelMissing { .. })));
    }

    #[test]
    fn run_transcribe_with_reports_failures() {
        let model_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.model.path = model_dir.path().to_path_buf();
        let backend = MockBackend::default();
        let files = vec![PathBuf::from("/nonexistent/a.wav")];
        let mut out = Vec::new();

        let failures = run_transcribe_with(&backend, &config, &files, false, &mut out).unwrap();

        assert_eq!(failures, 1);
        assert!(out.is_empty());
    }

    #[test]
    fn run_transcribe_with_writes_json_lines() {
        let model_dir = TempDir::new().unwrap();
        let wav_path = model_dir.path().join("clip.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&wav_path, spec).unwrap();
        for _ in 0..1024 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let mut config = Config::default();
        config.model.path = model_dir.path().to_path_buf();
        config.audio.frame_size = 512;
        let backend = MockBackend::new(
            MockRecognizer::new("m").with_boundary_every(2),
            MockAudioSource::new(),
        );
        let mut out = Vec::new();

        let failures = run_transcribe_with(&backend, &config, &[wav_path], true, &mut out).unwrap();

        assert_eq!(failures, 0);
        let line = String::from_utf8(out).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["filename"], "clip.wav");
        assert_eq!(value["transcription"], "word1 word2");
    }

    #[test]
    fn run_transcribe_with_missing_model() {
        let config = apply_overrides(Config::default(), Some("/nonexistent/model".into()), None);
        let mut out = Vec::new();
        let result = run_transcribe_with(&MockBackend::default(), &config, &[], false, &mut out);
        assert!(matches!(result, Err(VoxevalError::ModelMissing { .. })));
    }
}
