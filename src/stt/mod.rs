//! Speech recognition: the opaque `Recognizer` seam and its payload parsing.

pub mod recognizer;
pub mod result;
#[cfg(feature = "vosk")]
pub mod vosk;

pub use recognizer::{MockRecognizer, Recognizer, RecognizerProbe};
pub use result::{Hypothesis, RecognitionResult};
