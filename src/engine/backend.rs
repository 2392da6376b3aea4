use crate::audio::{AudioSource, MockAudioSource};
use crate::config::AudioConfig;
use crate::error::{Result, VoxevalError};
use crate::stt::{MockRecognizer, Recognizer};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Factory for the two resources an engine owns.
///
/// `initialize` calls both; the engine keeps the results until it is
/// destroyed.
pub trait EngineBackend: Send + Sync {
    /// Load the model at `model_path` and build a recognizer for `sample_rate` audio.
    fn load_recognizer(&self, model_path: &Path, sample_rate: u32) -> Result<Box<dyn Recognizer>>;

    /// Open (but do not start) the capture device.
    fn open_audio(&self, audio: &AudioConfig) -> Result<Box<dyn AudioSource>>;
}

/// Vosk recognizer with CPAL microphone capture.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBackend;

impl EngineBackend for LocalBackend {
    #[cfg(feature = "vosk")]
    fn load_recognizer(&self, model_path: &Path, sample_rate: u32) -> Result<Box<dyn Recognizer>> {
        let recognizer = crate::stt::vosk::VoskRecognizer::load(model_path, sample_rate)?;
        Ok(Box::new(recognizer))
    }

    #[cfg(not(feature = "vosk"))]
    fn load_recognizer(&self, _model_path: &Path, _sample_rate: u32) -> Result<Box<dyn Recognizer>> {
        Err(VoxevalError::BackendUnavailable {
            component: "Recognizer",
            feature: "vosk",
        })
    }

    #[cfg(feature = "cpal-audio")]
    fn open_audio(&self, audio: &AudioConfig) -> Result<Box<dyn AudioSource>> {
        let source =
            crate::audio::capture::CpalAudioSource::new(audio.device.as_deref(), audio.sample_rate)?;
        Ok(Box::new(source))
    }

    #[cfg(not(feature = "cpal-audio"))]
    fn open_audio(&self, _audio: &AudioConfig) -> Result<Box<dyn AudioSource>> {
        Err(VoxevalError::BackendUnavailable {
            component: "Audio capture",
            feature: "cpal-audio",
        })
    }
}

/// Mock backend for testing
///
/// Hands out clones of the configured mocks; their probes stay shared, so
/// activity can be observed after the engine takes ownership.
#[derive(Debug, Clone)]
pub struct MockBackend {
    recognizer: MockRecognizer,
    audio: MockAudioSource,
    fail_load: bool,
    fail_open: bool,
    loads: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new(recognizer: MockRecognizer, audio: MockAudioSource) -> Self {
        Self {
            recognizer,
            audio,
            fail_load: false,
            fail_open: false,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the mock to fail while loading the model
    pub fn with_load_failure(mut self) -> Self {
        self.fail_load = true;
        self
    }

    /// Configure the mock to fail while opening the device
    pub fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Successful and failed `load_recognizer` calls so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(MockRecognizer::new("mock-model"), MockAudioSource::new())
    }
}

impl EngineBackend for MockBackend {
    fn load_recognizer(&self, _model_path: &Path, _sample_rate: u32) -> Result<Box<dyn Recognizer>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(VoxevalError::ModelLoad {
                message: "mock model is corrupt".to_string(),
            });
        }
        Ok(Box::new(self.recognizer.clone()))
    }

    fn open_audio(&self, audio: &AudioConfig) -> Result<Box<dyn AudioSource>> {
        if self.fail_open {
            return Err(VoxevalError::AudioDeviceNotFound {
                device: audio.device.clone().unwrap_or_else(|| "default".to_string()),
            });
        }
        Ok(Box::new(self.audio.clone()))
    }
}
