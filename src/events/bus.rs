use crate::events::event::TranscriptEvent;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Fan-out of transcript events to any number of subscribers.
///
/// Each subscriber owns an unbounded channel, so `emit` never blocks the
/// transcription loop. Subscribers that hang up are dropped on the next emit.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<TranscriptEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<TranscriptEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub fn emit(&self, event: TranscriptEvent) {
        trace!("event: {}", event.kind());
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        subscribers.retain(|tx| {
            !matches!(
                tx.try_send(event.clone()),
                Err(TrySendError::Disconnected(_))
            )
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Drop every subscription; receivers see a closed channel once drained.
    pub fn close(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.clear();
        }
    }
}
