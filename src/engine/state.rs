use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a transcription engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Recording,
    Stopping,
    Destroyed,
}

impl EngineState {
    fn as_u8(self) -> u8 {
        match self {
            EngineState::Uninitialized => 0,
            EngineState::Ready => 1,
            EngineState::Recording => 2,
            EngineState::Stopping => 3,
            EngineState::Destroyed => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => EngineState::Uninitialized,
            1 => EngineState::Ready,
            2 => EngineState::Recording,
            3 => EngineState::Stopping,
            _ => EngineState::Destroyed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Ready => "ready",
            EngineState::Recording => "recording",
            EngineState::Stopping => "stopping",
            EngineState::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomically updated engine state.
///
/// Readers never block; transitions that race resolve through
/// compare-and-swap so exactly one caller wins.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: EngineState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn get(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: EngineState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Move from `from` to `to`; returns the observed state on failure.
    pub fn transition(
        &self,
        from: EngineState,
        to: EngineState,
    ) -> Result<(), EngineState> {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(EngineState::from_u8)
    }
}
