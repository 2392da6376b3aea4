pub mod bus;
pub mod event;
pub mod sink;

pub use bus::EventBus;
pub use event::TranscriptEvent;
pub use sink::{CollectorSink, EventSink, JsonLinesSink, RenderSink, spawn_sink};
