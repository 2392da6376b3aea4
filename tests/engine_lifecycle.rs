use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use voxeval::audio::MockAudioSource;
use voxeval::engine::MockBackend;
use voxeval::events::{CollectorSink, spawn_sink};
use voxeval::stt::MockRecognizer;
use voxeval::{Config, EngineState, TranscriptEvent, TranscriptionEngine, VoxevalError};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    engine: TranscriptionEngine,
    events: Receiver<TranscriptEvent>,
    _model_dir: TempDir,
}

fn harness(recognizer: MockRecognizer, audio: MockAudioSource) -> Harness {
    let model_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.model.path = model_dir.path().to_path_buf();
    config.audio.frame_size = 128;
    config.engine.short_read_backoff_ms = 1;
    config.engine.stop_grace_ms = 2000;

    let engine = TranscriptionEngine::new(config, Box::new(MockBackend::new(recognizer, audio)));
    let events = engine.subscribe();
    Harness {
        engine,
        events,
        _model_dir: model_dir,
    }
}

fn realtime_audio() -> MockAudioSource {
    MockAudioSource::new().with_read_delay(Duration::from_millis(2))
}

fn next_session(rx: &Receiver<TranscriptEvent>) -> Vec<TranscriptEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.recv_timeout(WAIT) {
        let last = matches!(event, TranscriptEvent::FinalResult { .. });
        events.push(event);
        if last {
            break;
        }
    }
    events
}

fn kinds(events: &[TranscriptEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind()).collect()
}

#[test]
fn full_lifecycle_event_order() {
    let h = harness(MockRecognizer::new("m").with_boundary_every(3), realtime_audio());

    h.engine.initialize().unwrap();
    h.engine.start().unwrap();
    thread::sleep(Duration::from_millis(30));
    h.engine.stop().unwrap();

    assert_eq!(h.events.recv_timeout(WAIT).unwrap(), TranscriptEvent::Ready);
    let events = next_session(&h.events);
    let kinds = kinds(&events);

    assert_eq!(kinds.first(), Some(&"start"));
    assert_eq!(&kinds[kinds.len() - 2..], &["end", "final_result"]);
    let stop_at = kinds.iter().position(|k| *k == "stop").unwrap();
    // At most one in-flight frame between Stop and End
    assert!(kinds.len() - 2 - stop_at <= 2);
    assert!(kinds[1..stop_at]
        .iter()
        .all(|k| *k == "partial" || *k == "final"));
    assert_eq!(h.engine.state(), EngineState::Ready);
}

#[test]
fn collector_transcript_matches_final_events() {
    let h = harness(MockRecognizer::new("m").with_boundary_every(2), realtime_audio());
    let collector = spawn_sink(h.engine.subscribe(), Box::new(CollectorSink::new())).unwrap();

    h.engine.initialize().unwrap();
    h.engine.start().unwrap();
    thread::sleep(Duration::from_millis(30));
    h.engine.stop().unwrap();

    let finals: Vec<String> = next_session(&h.events)
        .into_iter()
        .filter_map(|e| match e {
            TranscriptEvent::Final { text } | TranscriptEvent::FinalResult { text }
                if !text.is_empty() =>
            {
                Some(text)
            }
            _ => None,
        })
        .collect();

    h.engine.destroy().unwrap();
    let transcript = collector.join().unwrap().unwrap();
    assert_eq!(transcript, finals.join(" "));
}

#[test]
fn concurrent_callers_spawn_single_session() {
    let audio = realtime_audio();
    let probe = audio.probe();
    let h = harness(MockRecognizer::new("m"), audio);
    h.engine.initialize().unwrap();
    let engine = Arc::new(h.engine);

    let starters: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.start())
        })
        .collect();
    for starter in starters {
        starter.join().unwrap().unwrap();
    }
    engine.stop().unwrap();

    let _ready = h.events.recv_timeout(WAIT).unwrap();
    let events = next_session(&h.events);
    assert_eq!(kinds(&events).iter().filter(|k| **k == "start").count(), 1);
    assert_eq!(probe.starts(), 1);
    assert_eq!(probe.stops(), 1);
}

#[test]
fn missing_model_blocks_start() {
    let mut config = Config::default();
    config.model.path = "/nonexistent/voxeval/models/small".into();
    let engine = TranscriptionEngine::new(config, Box::new(MockBackend::default()));
    let rx = engine.subscribe();

    let err = engine.initialize().unwrap_err();

    assert!(err.to_string().contains("/nonexistent/voxeval/models/small"));
    match rx.recv_timeout(WAIT).unwrap() {
        TranscriptEvent::Error { message } => {
            assert!(message.contains("/nonexistent/voxeval/models/small"))
        }
        other => panic!("Expected Error event, got {:?}", other),
    }
    assert!(rx.try_recv().is_err());
    assert!(matches!(engine.start(), Err(VoxevalError::NotInitialized)));
    assert_eq!(engine.state(), EngineState::Uninitialized);
}

#[test]
fn device_failure_mid_session_recovers() {
    let audio = realtime_audio()
        .with_read_failure_after(2)
        .with_error_message("capture device disconnected");
    let h = harness(MockRecognizer::new("m"), audio);
    h.engine.initialize().unwrap();
    let _ready = h.events.recv_timeout(WAIT).unwrap();

    h.engine.start().unwrap();
    let events = next_session(&h.events);

    assert_eq!(
        kinds(&events),
        vec!["start", "partial", "partial", "error", "end", "final_result"]
    );
    assert_eq!(h.engine.state(), EngineState::Ready);
}

#[test]
fn destroy_mid_recording_then_reject_calls() {
    let h = harness(MockRecognizer::new("m"), realtime_audio());
    h.engine.initialize().unwrap();
    h.engine.start().unwrap();
    thread::sleep(Duration::from_millis(10));

    h.engine.destroy().unwrap();

    let all: Vec<_> = h.events.iter().collect();
    let kinds = kinds(&all);
    assert_eq!(&kinds[kinds.len() - 2..], &["end", "final_result"]);
    assert_eq!(h.engine.state(), EngineState::Destroyed);
    assert!(matches!(h.engine.start(), Err(VoxevalError::EngineDestroyed)));
    assert!(matches!(h.engine.destroy(), Err(VoxevalError::EngineDestroyed)));
}

#[test]
fn short_reads_never_reach_recognizer() {
    let recognizer = MockRecognizer::new("m");
    let frames = recognizer.probe();
    let audio = MockAudioSource::new()
        .with_samples_per_read(50)
        .with_starved_reads_every(4)
        .with_read_delay(Duration::from_millis(1));
    let h = harness(recognizer, audio);
    h.engine.initialize().unwrap();

    h.engine.start().unwrap();
    thread::sleep(Duration::from_millis(40));
    h.engine.stop().unwrap();

    let lengths = frames.frame_lengths();
    assert!(!lengths.is_empty());
    assert!(lengths.iter().all(|&len| len == 128));
    let stats = h.engine.last_session().unwrap();
    assert_eq!(stats.frames, lengths.len());
    assert!(stats.short_reads > 0);
}

#[test]
fn stop_while_loop_winds_down_after_device_failure() {
    let recognizer = MockRecognizer::new("m").with_flush_delay(Duration::from_millis(300));
    let audio = realtime_audio()
        .with_read_failure_after(1)
        .with_error_message("capture device disconnected");
    let h = harness(recognizer, audio);
    h.engine.initialize().unwrap();
    let _ready = h.events.recv_timeout(WAIT).unwrap();

    h.engine.start().unwrap();
    thread::sleep(Duration::from_millis(100));
    // The loop has ended and is flushing the recognizer
    assert_eq!(h.engine.state(), EngineState::Stopping);
    assert!(!h.engine.is_recording());

    h.engine.stop().unwrap();

    assert_eq!(h.engine.state(), EngineState::Ready);
    let events = next_session(&h.events);
    assert_eq!(
        kinds(&events),
        vec!["start", "partial", "error", "end", "final_result"]
    );
}

#[test]
fn stop_mid_read_completes_in_flight_frame() {
    let recognizer = MockRecognizer::new("m");
    let frames = recognizer.probe();
    let audio = MockAudioSource::new().with_read_delay(Duration::from_millis(100));
    let h = harness(recognizer, audio);
    h.engine.initialize().unwrap();
    let _ready = h.events.recv_timeout(WAIT).unwrap();

    h.engine.start().unwrap();
    thread::sleep(Duration::from_millis(20));
    h.engine.stop().unwrap();

    let events = next_session(&h.events);
    assert_eq!(
        kinds(&events),
        vec!["start", "stop", "partial", "end", "final_result"]
    );
    let classified = events
        .iter()
        .filter(|e| matches!(e, TranscriptEvent::Partial { .. } | TranscriptEvent::Final { .. }))
        .count();
    assert_eq!(frames.frames(), classified);
    assert_eq!(frames.frame_lengths(), vec![128]);
}
