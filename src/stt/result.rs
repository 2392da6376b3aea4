//! Parsing of recognizer payloads and per-frame classification.

use crate::error::{Result, VoxevalError};
use crate::events::TranscriptEvent;
use crate::stt::recognizer::Recognizer;
use serde::Deserialize;
use tracing::warn;

/// Word-level detail attached to a finished utterance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WordConfidence {
    pub conf: f32,
    pub start: f32,
    pub end: f32,
    pub word: String,
}

/// Best hypothesis for an utterance, as reported by the recognizer.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Hypothesis {
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "result")]
    pub words: Vec<WordConfidence>,
}

#[derive(Debug, Deserialize)]
struct PartialPayload {
    #[serde(default)]
    partial: String,
}

/// Classification of one fed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionResult {
    /// Utterance still in progress.
    Partial(String),
    /// Utterance boundary detected; carries the finished hypothesis.
    Final(String),
}

impl RecognitionResult {
    pub fn text(&self) -> &str {
        match self {
            RecognitionResult::Partial(text) | RecognitionResult::Final(text) => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, RecognitionResult::Final(_))
    }

    pub fn into_event(self) -> TranscriptEvent {
        match self {
            RecognitionResult::Partial(text) => TranscriptEvent::Partial { text },
            RecognitionResult::Final(text) => TranscriptEvent::Final { text },
        }
    }
}

/// Parse a `{"text": ..., "result": [...]}` payload.
pub fn parse_hypothesis(payload: &str) -> Result<Hypothesis> {
    serde_json::from_str(payload).map_err(|e| VoxevalError::MalformedRecognizerOutput {
        message: format!("{e} in {payload:?}"),
    })
}

/// Parse a `{"partial": ...}` payload.
pub fn parse_partial(payload: &str) -> Result<String> {
    serde_json::from_str::<PartialPayload>(payload)
        .map(|p| p.partial)
        .map_err(|e| VoxevalError::MalformedRecognizerOutput {
            message: format!("{e} in {payload:?}"),
        })
}

/// Feed one frame and classify the outcome.
///
/// Always yields exactly one result per frame. A decode failure or an
/// unparseable payload degrades to empty text instead of an error, so a
/// single bad frame cannot end a session.
pub fn classify_frame(recognizer: &mut dyn Recognizer, frame: &[i16]) -> RecognitionResult {
    let boundary = match recognizer.accept_waveform(frame) {
        Ok(boundary) => boundary,
        Err(e) => {
            warn!("recognizer rejected frame: {e}");
            return RecognitionResult::Partial(String::new());
        }
    };

    if boundary {
        let text = parse_hypothesis(&recognizer.result())
            .map(|h| h.text)
            .unwrap_or_else(|e| {
                warn!("{e}");
                String::new()
            });
        RecognitionResult::Final(text)
    } else {
        let text = parse_partial(&recognizer.partial_result()).unwrap_or_else(|e| {
            warn!("{e}");
            String::new()
        });
        RecognitionResult::Partial(text)
    }
}

/// Flush the recognizer and return the trailing hypothesis text.
pub fn flush_text(recognizer: &mut dyn Recognizer) -> String {
    parse_hypothesis(&recognizer.final_result())
        .map(|h| h.text)
        .unwrap_or_else(|e| {
            warn!("{e}");
            String::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::recognizer::MockRecognizer;

    #[test]
    fn parse_hypothesis_with_word_detail() {
        let payload = r#"{
            "result": [
                {"conf": 1.0, "end": 1.02, "start": 0.6, "word": "zoom"},
                {"conf": 0.87, "end": 1.4, "start": 1.02, "word": "in"}
            ],
            "text": "zoom in"
        }"#;

        let hypothesis = parse_hypothesis(payload).unwrap();

        assert_eq!(hypothesis.text, "zoom in");
        assert_eq!(hypothesis.words.len(), 2);
        assert_eq!(hypothesis.words[1].word, "in");
        assert!((hypothesis.words[1].conf - 0.87).abs() < f32::EPSILON);
    }

    #[test]
    fn parse_hypothesis_text_only() {
        let hypothesis = parse_hypothesis(r#"{"text": ""}"#).unwrap();
        assert_eq!(hypothesis, Hypothesis::default());
    }

    #[test]
    fn parse_partial_payload() {
        assert_eq!(
            parse_partial(r#"{"partial": "scroll do"}"#).unwrap(),
            "scroll do"
        );
        assert_eq!(parse_partial("{}").unwrap(), "");
    }

    #[test]
    fn parse_rejects_malformed_payload() {
        match parse_partial(r#"{"partial": "#) {
            Err(VoxevalError::MalformedRecognizerOutput { message }) => {
                assert!(message.contains("partial"));
            }
            other => panic!("Expected MalformedRecognizerOutput, got {:?}", other),
        }
        assert!(parse_hypothesis("[1, 2]").is_err());
    }

    #[test]
    fn classify_frame_partial_then_final() {
        let mut recognizer = MockRecognizer::new("test").with_script(&[false, true]);
        let frame = [0i16; 8];

        assert_eq!(
            classify_frame(&mut recognizer, &frame),
            RecognitionResult::Partial("word1".to_string())
        );
        assert_eq!(
            classify_frame(&mut recognizer, &frame),
            RecognitionResult::Final("word1 word2".to_string())
        );
    }

    #[test]
    fn classify_frame_malformed_degrades_to_empty() {
        let mut recognizer = MockRecognizer::new("test")
            .with_script(&[false, true])
            .with_malformed_output();
        let frame = [0i16; 8];

        assert_eq!(
            classify_frame(&mut recognizer, &frame),
            RecognitionResult::Partial(String::new())
        );
        assert_eq!(
            classify_frame(&mut recognizer, &frame),
            RecognitionResult::Final(String::new())
        );
        assert_eq!(flush_text(&mut recognizer), "");
    }

    #[test]
    fn classify_frame_decode_failure_is_empty_partial() {
        let mut recognizer = MockRecognizer::new("test").with_accept_failure();
        assert_eq!(
            classify_frame(&mut recognizer, &[0i16; 8]),
            RecognitionResult::Partial(String::new())
        );
    }

    #[test]
    fn recognition_result_into_event() {
        let final_result = RecognitionResult::Final("next page".to_string());
        assert!(final_result.is_final());
        assert_eq!(final_result.text(), "next page");
        assert_eq!(
            final_result.into_event(),
            TranscriptEvent::Final {
                text: "next page".to_string()
            }
        );
        assert_eq!(
            RecognitionResult::Partial("next".to_string()).into_event(),
            TranscriptEvent::Partial {
                text: "next".to_string()
            }
        );
    }

    #[test]
    fn flush_text_returns_pending_words() {
        let mut recognizer = MockRecognizer::new("test");
        recognizer.accept_waveform(&[0i16; 8]).unwrap();
        assert_eq!(flush_text(&mut recognizer), "word1");
    }
}
