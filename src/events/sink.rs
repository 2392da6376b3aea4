use crate::error::Result;
use crate::events::event::TranscriptEvent;
use crate::output::render_event;
use crossbeam_channel::Receiver;
use std::io::Write;
use std::thread::{self, JoinHandle};
use tracing::warn;

/// Pluggable consumer of transcript events.
pub trait EventSink: Send + 'static {
    /// Handle one event. Called in emission order.
    fn handle(&mut self, event: &TranscriptEvent) -> Result<()>;

    /// Called once the event stream closes. Return accumulated text if applicable.
    fn finish(&mut self) -> Option<String> {
        None
    }

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Drive `sink` from `events` on a dedicated thread until the bus closes.
///
/// The handle yields the sink's `finish()` value. A failing `handle` is
/// logged and the stream continues.
pub fn spawn_sink(
    events: Receiver<TranscriptEvent>,
    mut sink: Box<dyn EventSink>,
) -> std::io::Result<JoinHandle<Option<String>>> {
    thread::Builder::new()
        .name(format!("sink-{}", sink.name()))
        .spawn(move || {
            for event in events.iter() {
                if let Err(e) = sink.handle(&event) {
                    warn!("{} sink failed on {}: {e}", sink.name(), event.kind());
                }
            }
            sink.finish()
        })
}

/// Records every event and builds the transcript from finished utterances.
///
/// `Final` texts and a non-empty trailing `FinalResult` are joined in order.
#[derive(Debug, Default)]
pub struct CollectorSink {
    events: Vec<TranscriptEvent>,
    utterances: Vec<String>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TranscriptEvent] {
        &self.events
    }

    pub fn transcript(&self) -> String {
        self.utterances.join(" ")
    }
}

impl EventSink for CollectorSink {
    fn handle(&mut self, event: &TranscriptEvent) -> Result<()> {
        match event {
            TranscriptEvent::Final { text } | TranscriptEvent::FinalResult { text }
                if !text.trim().is_empty() =>
            {
                self.utterances.push(text.trim().to_string());
            }
            _ => {}
        }
        self.events.push(event.clone());
        Ok(())
    }

    fn finish(&mut self) -> Option<String> {
        if self.utterances.is_empty() {
            None
        } else {
            Some(self.transcript())
        }
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Writes one JSON document per event.
pub struct JsonLinesSink<W: Write + Send + 'static> {
    writer: W,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> EventSink for JsonLinesSink<W> {
    fn handle(&mut self, event: &TranscriptEvent) -> Result<()> {
        let line = event
            .to_json()
            .map_err(|e| crate::error::VoxevalError::Other(e.to_string()))?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

/// Human-readable terminal output on stderr.
pub struct RenderSink {
    show_partials: bool,
}

impl RenderSink {
    pub fn new(show_partials: bool) -> Self {
        Self { show_partials }
    }
}

impl EventSink for RenderSink {
    fn handle(&mut self, event: &TranscriptEvent) -> Result<()> {
        if !self.show_partials && matches!(event, TranscriptEvent::Partial { .. }) {
            return Ok(());
        }
        render_event(event);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "render"
    }
}
