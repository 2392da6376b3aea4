use crate::error::{Result, VoxevalError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for streaming, block-oriented speech recognizers.
///
/// Results are returned as JSON payloads in the Kaldi/Vosk shape and are
/// parsed by [`crate::stt::result`]; the recognizer itself stays opaque.
/// Methods take `&mut self`, so a recognizer is only ever fed from one
/// thread at a time.
pub trait Recognizer: Send {
    /// Feed one frame of 16-bit PCM.
    ///
    /// # Returns
    /// `true` when an utterance boundary was detected; the finished
    /// hypothesis is then available from [`Recognizer::result`].
    fn accept_waveform(&mut self, frame: &[i16]) -> Result<bool>;

    /// Hypothesis for the utterance that just ended: `{"text": ...}`.
    fn result(&mut self) -> String;

    /// Hypothesis for the utterance in progress: `{"partial": ...}`.
    fn partial_result(&mut self) -> String;

    /// Flush any unfinished audio and return its best hypothesis.
    fn final_result(&mut self) -> String;

    /// Drop decoder state without producing a result.
    fn reset(&mut self) {}

    /// Name of the loaded model
    fn model_name(&self) -> &str;
}

#[derive(Debug, Default)]
struct RecognizerCounters {
    frames: AtomicUsize,
    flushes: AtomicUsize,
    frame_lengths: Mutex<Vec<usize>>,
}

/// Shared view of a mock recognizer, readable after it has been moved.
#[derive(Debug, Clone, Default)]
pub struct RecognizerProbe(Arc<RecognizerCounters>);

impl RecognizerProbe {
    /// Frames passed to `accept_waveform`.
    pub fn frames(&self) -> usize {
        self.0.frames.load(Ordering::SeqCst)
    }

    /// Calls to `final_result`.
    pub fn flushes(&self) -> usize {
        self.0.flushes.load(Ordering::SeqCst)
    }

    /// Length of every frame fed, in order.
    pub fn frame_lengths(&self) -> Vec<usize> {
        self.0
            .frame_lengths
            .lock()
            .map(|lengths| lengths.clone())
            .unwrap_or_default()
    }
}

/// Mock recognizer for testing
///
/// Every fed frame adds one word to the utterance in progress. Boundaries
/// come either from a fixed script or every `n` frames.
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    model_name: String,
    script: Vec<bool>,
    boundary_every: Option<usize>,
    malformed: bool,
    fail_accept: bool,
    panic_on_frame: Option<usize>,
    flush_delay: Duration,
    pending_words: Vec<String>,
    utterances: usize,
    probe: RecognizerProbe,
}

impl MockRecognizer {
    /// Create a new mock recognizer that never detects a boundary
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            script: Vec::new(),
            boundary_every: None,
            malformed: false,
            fail_accept: false,
            panic_on_frame: None,
            flush_delay: Duration::ZERO,
            pending_words: Vec::new(),
            utterances: 0,
            probe: RecognizerProbe::default(),
        }
    }

    /// Boundary flags for the first frames, in feed order
    pub fn with_script(mut self, boundaries: &[bool]) -> Self {
        self.script = boundaries.to_vec();
        self
    }

    /// After the script runs out, every `n`-th frame ends an utterance
    pub fn with_boundary_every(mut self, n: usize) -> Self {
        self.boundary_every = Some(n.max(1));
        self
    }

    /// Return payloads that are not valid JSON
    pub fn with_malformed_output(mut self) -> Self {
        self.malformed = true;
        self
    }

    /// Fail every `accept_waveform` call
    pub fn with_accept_failure(mut self) -> Self {
        self.fail_accept = true;
        self
    }

    /// Panic while decoding the `n`-th frame
    pub fn with_panic_on_frame(mut self, n: usize) -> Self {
        self.panic_on_frame = Some(n);
        self
    }

    /// Sleep this long in `final_result`, like a large model flushing
    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    /// Handle for observing this recognizer after it has been moved.
    pub fn probe(&self) -> RecognizerProbe {
        self.probe.clone()
    }

    fn is_boundary(&self, frame_index: usize) -> bool {
        if let Some(&flag) = self.script.get(frame_index - 1) {
            return flag;
        }
        match self.boundary_every {
            Some(n) => frame_index % n == 0,
            None => false,
        }
    }

    fn payload(&self, key: &str, text: &str) -> String {
        if self.malformed {
            format!("{{\"{key}\": ")
        } else {
            serde_json::json!({ key: text }).to_string()
        }
    }
}

impl Recognizer for MockRecognizer {
    fn accept_waveform(&mut self, frame: &[i16]) -> Result<bool> {
        let frame_index = self.probe.0.frames.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut lengths) = self.probe.0.frame_lengths.lock() {
            lengths.push(frame.len());
        }

        if self.panic_on_frame == Some(frame_index) {
            panic!("mock recognizer panicked on frame {frame_index}");
        }
        if self.fail_accept {
            return Err(VoxevalError::Recognizer {
                message: "mock decode failure".to_string(),
            });
        }

        self.pending_words.push(format!("word{frame_index}"));
        Ok(self.is_boundary(frame_index))
    }

    fn result(&mut self) -> String {
        self.utterances += 1;
        let text = self.pending_words.join(" ");
        self.pending_words.clear();
        self.payload("text", &text)
    }

    fn partial_result(&mut self) -> String {
        self.payload("partial", &self.pending_words.join(" "))
    }

    fn final_result(&mut self) -> String {
        self.probe.0.flushes.fetch_add(1, Ordering::SeqCst);
        if !self.flush_delay.is_zero() {
            std::thread::sleep(self.flush_delay);
        }
        let text = self.pending_words.join(" ");
        self.pending_words.clear();
        self.payload("text", &text)
    }

    fn reset(&mut self) {
        self.pending_words.clear();
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_recognizer_partial_accumulates_words() {
        let mut recognizer = MockRecognizer::new("test-model");
        let frame = vec![0i16; 16];

        assert!(!recognizer.accept_waveform(&frame).unwrap());
        assert!(!recognizer.accept_waveform(&frame).unwrap());

        assert_eq!(recognizer.partial_result(), r#"{"partial":"word1 word2"}"#);
    }

    #[test]
    fn test_mock_recognizer_script_then_period() {
        let mut recognizer = MockRecognizer::new("test-model")
            .with_script(&[false, true])
            .with_boundary_every(3);
        let frame = vec![0i16; 16];

        let boundaries: Vec<bool> = (0..6)
            .map(|_| recognizer.accept_waveform(&frame).unwrap())
            .collect();

        assert_eq!(boundaries, vec![false, true, true, false, false, true]);
    }

    #[test]
    fn test_mock_recognizer_result_clears_pending() {
        let mut recognizer = MockRecognizer::new("test-model").with_script(&[false, true]);
        let frame = vec![0i16; 16];

        recognizer.accept_waveform(&frame).unwrap();
        recognizer.accept_waveform(&frame).unwrap();

        assert_eq!(recognizer.result(), r#"{"text":"word1 word2"}"#);
        assert_eq!(recognizer.final_result(), r#"{"text":""}"#);
    }

    #[test]
    fn test_mock_recognizer_final_result_flushes_pending() {
        let mut recognizer = MockRecognizer::new("test-model");
        let probe = recognizer.probe();

        recognizer.accept_waveform(&[0i16; 4]).unwrap();

        assert_eq!(recognizer.final_result(), r#"{"text":"word1"}"#);
        assert_eq!(probe.flushes(), 1);
        assert_eq!(probe.frames(), 1);
        assert_eq!(probe.frame_lengths(), vec![4]);
    }

    #[test]
    fn test_mock_recognizer_malformed_output() {
        let mut recognizer = MockRecognizer::new("test-model").with_malformed_output();
        recognizer.accept_waveform(&[0i16; 4]).unwrap();

        let payload = recognizer.partial_result();
        assert!(serde_json::from_str::<serde_json::Value>(&payload).is_err());
    }

    #[test]
    fn test_mock_recognizer_accept_failure() {
        let mut recognizer = MockRecognizer::new("test-model").with_accept_failure();
        match recognizer.accept_waveform(&[0i16; 4]) {
            Err(VoxevalError::Recognizer { message }) => {
                assert_eq!(message, "mock decode failure");
            }
            other => panic!("Expected Recognizer error, got {:?}", other),
        }
    }

    #[test]
    fn test_recognizer_trait_is_object_safe() {
        let mut recognizer: Box<dyn Recognizer> = Box::new(MockRecognizer::new("boxed"));
        assert_eq!(recognizer.model_name(), "boxed");
        assert!(!recognizer.accept_waveform(&[0i16; 4]).unwrap());
        recognizer.reset();
        assert_eq!(recognizer.final_result(), r#"{"text":""}"#);
    }
}
