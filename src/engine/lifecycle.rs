use crate::audio::AudioSource;
use crate::config::Config;
use crate::engine::backend::EngineBackend;
use crate::engine::state::{EngineState, StateCell};
use crate::engine::transcription_loop::{LoopExit, LoopSettings, SessionStats, run_frames};
use crate::error::{Result, VoxevalError};
use crate::events::{EventBus, TranscriptEvent};
use crate::stt::Recognizer;
use crate::stt::result::flush_text;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// The two handles a session borrows from the engine.
struct Resources {
    recognizer: Box<dyn Recognizer>,
    audio: Box<dyn AudioSource>,
}

/// Control-side view of a running loop.
struct Session {
    cancel: Arc<AtomicBool>,
    /// Closed by the loop as its very last action.
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slots {
    /// `None` while a loop holds them or before `initialize`.
    resources: Option<Resources>,
    session: Option<Session>,
    last_session: Option<SessionStats>,
}

struct Shared {
    state: StateCell,
    slots: Mutex<Slots>,
    bus: EventBus,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        // Nothing panics while holding the lock; recover the data if it ever did
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Streaming transcription engine.
///
/// Owns one recognizer and one audio source, and drives them from a
/// dedicated loop thread while recording. Lifecycle calls are serialized
/// internally and may come from any thread.
pub struct TranscriptionEngine {
    config: Config,
    backend: Box<dyn EngineBackend>,
    shared: Arc<Shared>,
}

impl TranscriptionEngine {
    pub fn new(config: Config, backend: Box<dyn EngineBackend>) -> Self {
        Self {
            config,
            backend,
            shared: Arc::new(Shared {
                state: StateCell::new(EngineState::Uninitialized),
                slots: Mutex::new(Slots::default()),
                bus: EventBus::new(),
            }),
        }
    }

    /// Event bus handle; clone it to emit or subscribe elsewhere.
    pub fn events(&self) -> &EventBus {
        &self.shared.bus
    }

    pub fn subscribe(&self) -> Receiver<TranscriptEvent> {
        self.shared.bus.subscribe()
    }

    pub fn state(&self) -> EngineState {
        self.shared.state.get()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == EngineState::Recording
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Counters of the most recently finished session.
    pub fn last_session(&self) -> Option<SessionStats> {
        self.shared.slots().last_session.clone()
    }

    /// Load the model and open the capture device.
    ///
    /// A missing model directory fails with `ModelMissing`; every failure
    /// also emits one `Error` event and leaves the engine uninitialized.
    pub fn initialize(&self) -> Result<()> {
        let mut slots = self.shared.slots();
        match self.state() {
            EngineState::Destroyed => return Err(VoxevalError::EngineDestroyed),
            EngineState::Uninitialized => {}
            state => {
                debug!("initialize: already {state}");
                return Ok(());
            }
        }

        let model_path = &self.config.model.path;
        let loaded = if model_path.exists() {
            self.backend
                .load_recognizer(model_path, self.config.audio.sample_rate)
                .and_then(|recognizer| {
                    let audio = self.backend.open_audio(&self.config.audio)?;
                    Ok(Resources { recognizer, audio })
                })
        } else {
            Err(VoxevalError::ModelMissing {
                path: model_path.display().to_string(),
            })
        };

        match loaded {
            Ok(resources) => {
                info!(
                    "engine ready: model {} at {} Hz, {} samples per frame",
                    resources.recognizer.model_name(),
                    self.config.audio.sample_rate,
                    self.config.audio.frame_size
                );
                slots.resources = Some(resources);
                self.shared.state.set(EngineState::Ready);
                self.shared.bus.emit(TranscriptEvent::Ready);
                Ok(())
            }
            Err(e) => {
                error!("initialize failed: {e}");
                self.shared.bus.emit(TranscriptEvent::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Start recording. A no-op while already recording.
    ///
    /// The audio device is started before `Start` is emitted, so a device
    /// that fails to start produces a single `Error` event and no `Start`;
    /// the engine stays `Ready`.
    pub fn start(&self) -> Result<()> {
        let mut slots = self.shared.slots();
        match self.state() {
            EngineState::Destroyed => return Err(VoxevalError::EngineDestroyed),
            EngineState::Uninitialized => return Err(VoxevalError::NotInitialized),
            EngineState::Recording => {
                debug!("start: already recording");
                return Ok(());
            }
            EngineState::Stopping => {
                return Err(VoxevalError::EngineBusy {
                    state: EngineState::Stopping.to_string(),
                });
            }
            EngineState::Ready => {}
        }

        if let Err(observed) = self
            .shared
            .state
            .transition(EngineState::Ready, EngineState::Recording)
        {
            return Err(VoxevalError::EngineBusy {
                state: observed.to_string(),
            });
        }

        let Some(mut resources) = slots.resources.take() else {
            self.shared.state.set(EngineState::Uninitialized);
            return Err(VoxevalError::NotInitialized);
        };

        if let Err(e) = resources.audio.start() {
            warn!("audio start failed: {e}");
            slots.resources = Some(resources);
            self.shared.state.set(EngineState::Ready);
            self.shared.bus.emit(TranscriptEvent::error(e.to_string()));
            return Err(e);
        }

        self.shared.bus.emit(TranscriptEvent::Start);

        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        let shared = Arc::clone(&self.shared);
        let loop_cancel = Arc::clone(&cancel);
        let settings = LoopSettings::from_config(&self.config);

        let spawned = thread::Builder::new()
            .name("transcription".to_string())
            .spawn(move || run_session(shared, resources, loop_cancel, settings, done_tx));

        match spawned {
            Ok(handle) => {
                slots.session = Some(Session {
                    cancel,
                    done: done_rx,
                    handle,
                });
                info!("recording started");
                Ok(())
            }
            Err(e) => {
                // The closure, and the resources it captured, are gone
                error!("failed to spawn transcription loop: {e}");
                self.shared.state.set(EngineState::Uninitialized);
                self.shared
                    .bus
                    .emit(TranscriptEvent::error(format!("Failed to start loop: {e}")));
                Err(VoxevalError::Io(e))
            }
        }
    }

    /// Request the loop to stop and wait for it, at most `stop_grace_ms`.
    ///
    /// A no-op unless recording. On timeout the engine stays `Stopping`
    /// and settles to `Ready` by itself once the loop exits; calling
    /// `stop` again waits another grace period. A loop that is already
    /// winding down on its own is waited for without emitting `Stop`.
    pub fn stop(&self) -> Result<()> {
        let (cancel, done) = {
            let mut slots = self.shared.slots();
            match self.state() {
                EngineState::Destroyed => return Err(VoxevalError::EngineDestroyed),
                EngineState::Uninitialized | EngineState::Ready => {
                    reap_finished(&mut slots);
                    return Ok(());
                }
                EngineState::Recording => {
                    // Loses to a loop that has just ended by itself
                    if self
                        .shared
                        .state
                        .transition(EngineState::Recording, EngineState::Stopping)
                        .is_ok()
                    {
                        self.shared.bus.emit(TranscriptEvent::Stop);
                    }
                }
                EngineState::Stopping => {}
            }
            let Some(session) = slots.session.as_ref() else {
                return Ok(());
            };
            (Arc::clone(&session.cancel), session.done.clone())
        };

        cancel.store(true, Ordering::SeqCst);

        let grace = self.config.engine.stop_grace();
        match done.recv_timeout(grace) {
            Err(RecvTimeoutError::Timeout) => {
                warn!("transcription loop still running after {grace:?}");
                Err(VoxevalError::StopTimeout {
                    grace_ms: self.config.engine.stop_grace_ms,
                })
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let finished = self
                    .shared
                    .slots()
                    .session
                    .take_if(|s| Arc::ptr_eq(&s.cancel, &cancel));
                if let Some(session) = finished
                    && session.handle.join().is_err()
                {
                    warn!("transcription thread panicked after signalling completion");
                }
                info!("recording stopped");
                Ok(())
            }
        }
    }

    /// Stop any recording and release the recognizer and audio device.
    ///
    /// Safe while recording: `End` and `FinalResult` are emitted before the
    /// engine reaches `Destroyed` unless the loop outlives the stop grace
    /// period, in which case it is detached and releases its own resources.
    pub fn destroy(&self) -> Result<()> {
        if self.state() == EngineState::Destroyed {
            return Err(VoxevalError::EngineDestroyed);
        }

        if let Err(e) = self.stop() {
            warn!("destroy: {e}");
        }

        let (resources, session) = {
            let mut slots = self.shared.slots();
            if self.state() == EngineState::Destroyed {
                return Err(VoxevalError::EngineDestroyed);
            }
            self.shared.state.set(EngineState::Destroyed);
            (slots.resources.take(), slots.session.take())
        };

        if let Some(session) = session {
            session.cancel.store(true, Ordering::SeqCst);
            if session.handle.is_finished() {
                if session.handle.join().is_err() {
                    warn!("transcription thread panicked");
                }
            } else {
                warn!("destroy: detaching transcription loop that is still running");
            }
        }
        drop(resources);

        self.shared.bus.close();
        info!("engine destroyed");
        Ok(())
    }
}

impl Drop for TranscriptionEngine {
    fn drop(&mut self) {
        if self.state() != EngineState::Destroyed
            && let Err(e) = self.destroy()
        {
            warn!("engine drop: {e}");
        }
    }
}

/// Join a session whose loop already settled the engine by itself.
fn reap_finished(slots: &mut Slots) {
    if !slots.session.as_ref().is_some_and(|s| s.handle.is_finished()) {
        return;
    }
    if let Some(session) = slots.session.take()
        && session.handle.join().is_err()
    {
        warn!("transcription thread panicked after signalling completion");
    }
}

/// Body of the loop thread.
///
/// Returns the borrowed resources to the engine and settles its state
/// before closing `done`, so a `stop` that sees completion also sees
/// `Ready`.
fn run_session(
    shared: Arc<Shared>,
    mut resources: Resources,
    cancel: Arc<AtomicBool>,
    settings: LoopSettings,
    done: Sender<()>,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let bus = &shared.bus;
        let (exit, stats) = run_frames(
            resources.recognizer.as_mut(),
            resources.audio.as_mut(),
            &cancel,
            &settings,
            &mut |event| bus.emit(event),
        );
        // A loop ending by itself claims Stopping so a racing stop() stays silent
        if shared
            .state
            .transition(EngineState::Recording, EngineState::Stopping)
            .is_ok()
        {
            debug!("loop ended without stop request: {exit:?}");
        }
        if let LoopExit::DeviceError(message) = &exit {
            error!("audio device read failed: {message}");
            bus.emit(TranscriptEvent::error(format!(
                "Audio device read failed: {message}"
            )));
        }
        if let Err(e) = resources.audio.stop() {
            warn!("audio stop failed: {e}");
        }
        bus.emit(TranscriptEvent::End);
        let trailing = flush_text(resources.recognizer.as_mut());
        (stats, trailing)
    }));

    let mut slots = shared.slots();
    let destroyed = shared.state.get() == EngineState::Destroyed;
    match outcome {
        Ok((stats, trailing)) => {
            info!(
                "session finished: {} frames, {} finals in {:?}",
                stats.frames, stats.finals, stats.duration
            );
            slots.last_session = Some(stats);
            if destroyed {
                drop(resources);
            } else {
                slots.resources = Some(resources);
                shared.state.set(EngineState::Ready);
            }
            shared
                .bus
                .emit(TranscriptEvent::FinalResult { text: trailing });
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            error!("transcription loop panicked: {message}");
            drop(resources);
            if !destroyed {
                shared.state.set(EngineState::Uninitialized);
            }
            shared.bus.emit(TranscriptEvent::error(format!(
                "Transcription loop panicked: {message}"
            )));
            shared.bus.emit(TranscriptEvent::End);
        }
    }
    drop(slots);
    drop(done);
}
