#![cfg(feature = "vosk")]

use std::path::PathBuf;
use voxeval::Config;
use voxeval::audio::WavAudioSource;
use voxeval::engine::{EngineBackend, LocalBackend, transcribe_source};

fn find_model() -> Option<PathBuf> {
    let path = Config::default().with_env_overrides().model.path;
    if path.exists() {
        Some(path)
    } else {
        eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
        eprintln!("║  NO VOSK MODEL FOUND - SKIPPING RECOGNIZER TESTS             ║");
        eprintln!("║                                                              ║");
        eprintln!("║  Unpack a model into ~/Downloads/vosk/models/ or set         ║");
        eprintln!("║    VOXEVAL_MODEL_PATH=/path/to/vosk-model                    ║");
        eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
        None
    }
}

fn silence_wav(seconds: usize) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for _ in 0..seconds * 16000 {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}

#[test]
fn silence_produces_no_words() {
    let Some(model) = find_model() else {
        return;
    };
    let mut recognizer = LocalBackend.load_recognizer(&model, 16000).unwrap();
    let mut source =
        WavAudioSource::from_reader(Box::new(std::io::Cursor::new(silence_wav(2)))).unwrap();

    let result = transcribe_source(recognizer.as_mut(), &mut source, "silence.wav", 8192).unwrap();

    assert_eq!(result.stats.frames, 4);
    assert!(result.transcription.trim().is_empty());
}

#[test]
fn recognizer_is_reusable_across_files() {
    let Some(model) = find_model() else {
        return;
    };
    let mut recognizer = LocalBackend.load_recognizer(&model, 16000).unwrap();

    for name in ["first.wav", "second.wav"] {
        let mut source =
            WavAudioSource::from_reader(Box::new(std::io::Cursor::new(silence_wav(1)))).unwrap();
        let result = transcribe_source(recognizer.as_mut(), &mut source, name, 4096).unwrap();
        assert_eq!(result.filename, name);
        assert_eq!(result.stats.frames, 4);
    }
}
