//! Vosk/Kaldi recognizer backend.

use crate::error::{Result, VoxevalError};
use crate::stt::recognizer::Recognizer;
use serde_json::json;
use std::path::Path;
use tracing::debug;
use vosk::{CompleteResult, DecodingState, Model};

/// Streaming recognizer backed by a Vosk model directory.
pub struct VoskRecognizer {
    // Kept alive for the lifetime of the recognizer.
    _model: Model,
    recognizer: vosk::Recognizer,
    model_name: String,
}

impl VoskRecognizer {
    /// Load a model directory and build a recognizer for `sample_rate` audio.
    pub fn load(model_path: &Path, sample_rate: u32) -> Result<Self> {
        if !model_path.exists() {
            return Err(VoxevalError::ModelMissing {
                path: model_path.display().to_string(),
            });
        }

        vosk::set_log_level(vosk::LogLevel::Error);

        let path_str = model_path.to_str().ok_or_else(|| VoxevalError::ModelLoad {
            message: format!("Model path is not valid UTF-8: {}", model_path.display()),
        })?;
        let model = Model::new(path_str).ok_or_else(|| VoxevalError::ModelLoad {
            message: format!("Failed to load model from {}", model_path.display()),
        })?;
        let mut recognizer = vosk::Recognizer::new(&model, sample_rate as f32).ok_or_else(|| {
            VoxevalError::ModelLoad {
                message: format!("Failed to create recognizer at {sample_rate} Hz"),
            }
        })?;
        recognizer.set_words(true);

        let model_name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "vosk".to_string());
        debug!("loaded vosk model {model_name} at {sample_rate} Hz");

        Ok(Self {
            _model: model,
            recognizer,
            model_name,
        })
    }
}

fn complete_payload(result: CompleteResult<'_>) -> String {
    match result.single() {
        Some(single) => {
            let words: Vec<_> = single
                .result
                .iter()
                .map(|w| json!({"conf": w.conf, "start": w.start, "end": w.end, "word": w.word}))
                .collect();
            json!({"text": single.text, "result": words}).to_string()
        }
        None => json!({"text": ""}).to_string(),
    }
}

impl Recognizer for VoskRecognizer {
    fn accept_waveform(&mut self, frame: &[i16]) -> Result<bool> {
        match self.recognizer.accept_waveform(frame) {
            Ok(DecodingState::Finalized) => Ok(true),
            Ok(DecodingState::Running) => Ok(false),
            Ok(DecodingState::Failed) => Err(VoxevalError::Recognizer {
                message: "decoding failed".to_string(),
            }),
            Err(e) => Err(VoxevalError::Recognizer {
                message: e.to_string(),
            }),
        }
    }

    fn result(&mut self) -> String {
        complete_payload(self.recognizer.result())
    }

    fn partial_result(&mut self) -> String {
        json!({"partial": self.recognizer.partial_result().partial}).to_string()
    }

    fn final_result(&mut self) -> String {
        complete_payload(self.recognizer.final_result())
    }

    fn reset(&mut self) {
        self.recognizer.reset();
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_model_reports_path() {
        let path = Path::new("/nonexistent/voxeval/vosk-model");
        match VoskRecognizer::load(path, 16000) {
            Err(VoxevalError::ModelMissing { path: reported }) => {
                assert_eq!(reported, "/nonexistent/voxeval/vosk-model");
            }
            Err(other) => panic!("Expected ModelMissing, got {:?}", other),
            Ok(_) => panic!("Expected ModelMissing, got a recognizer"),
        }
    }

    #[test]
    #[ignore = "requires a downloaded Vosk model"]
    fn load_default_model_and_decode_silence() {
        let config = crate::config::Config::default();
        let mut recognizer = VoskRecognizer::load(&config.model.path, 16000).unwrap();
        let silence = vec![0i16; 8192];

        for _ in 0..4 {
            recognizer.accept_waveform(&silence).unwrap();
        }
        let payload = recognizer.final_result();
        let hypothesis = crate::stt::result::parse_hypothesis(&payload).unwrap();
        assert!(hypothesis.text.is_empty());
    }
}
