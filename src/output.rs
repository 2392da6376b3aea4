//! Shared event rendering for terminal output.

use crate::events::TranscriptEvent;
use std::io::{self, Write};

const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Clear the current terminal line (replaces the in-progress partial)
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// Plain one-line description of an event, without colors.
pub fn describe_event(event: &TranscriptEvent) -> String {
    match event {
        TranscriptEvent::Ready => "Ready".to_string(),
        TranscriptEvent::Error { message } => format!("Error: {message}"),
        TranscriptEvent::Start => "Recording started".to_string(),
        TranscriptEvent::Stop => "Stopping".to_string(),
        TranscriptEvent::End => "Recording ended".to_string(),
        TranscriptEvent::Partial { text } => format!("... {text}"),
        TranscriptEvent::Final { text } => text.clone(),
        TranscriptEvent::FinalResult { text } if text.is_empty() => "(no trailing text)".to_string(),
        TranscriptEvent::FinalResult { text } => text.clone(),
    }
}

pub fn render_event(event: &TranscriptEvent) {
    match event {
        TranscriptEvent::Partial { text } => {
            // Overwritten in place until the utterance finishes
            eprint!("\r\x1b[2K{DIM}{text}{RESET}");
            io::stderr().flush().ok();
        }
        TranscriptEvent::Final { text } => {
            clear_line();
            if !text.is_empty() {
                eprintln!("{BOLD}{text}{RESET}");
            }
        }
        TranscriptEvent::FinalResult { text } => {
            clear_line();
            if !text.is_empty() {
                eprintln!("{BOLD}{text}{RESET}");
            }
        }
        TranscriptEvent::Ready | TranscriptEvent::Start => {
            clear_line();
            eprintln!("{GREEN}{}{RESET}", describe_event(event));
        }
        TranscriptEvent::Error { .. } => {
            clear_line();
            eprintln!("{RED}{}{RESET}", describe_event(event));
        }
        TranscriptEvent::Stop | TranscriptEvent::End => {
            clear_line();
            eprintln!("{DIM}{}{RESET}", describe_event(event));
        }
    }
}
