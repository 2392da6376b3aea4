//! Frame loop: read fixed-size frames, feed the recognizer, classify.

use crate::audio::AudioSource;
use crate::config::Config;
use crate::defaults;
use crate::events::TranscriptEvent;
use crate::stt::Recognizer;
use crate::stt::result::classify_frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Frame geometry and timing for one loop run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub frame_size: usize,
    /// Pause before retrying a read that returned no samples.
    pub short_read_backoff: Duration,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            frame_size: config.audio.frame_size,
            short_read_backoff: config.engine.short_read_backoff(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            frame_size: defaults::FRAME_SIZE,
            short_read_backoff: Duration::from_millis(defaults::SHORT_READ_BACKOFF_MS),
        }
    }
}

/// Counters for one recording or file session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Frames fed to the recognizer.
    pub frames: usize,
    pub partials: usize,
    pub finals: usize,
    /// Reads that returned no samples.
    pub short_reads: usize,
    pub duration: Duration,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// Cancellation flag observed.
    Cancelled,
    /// Finite source ran out of samples.
    Exhausted,
    /// Hard read failure from the device.
    DeviceError(String),
}

enum Fill {
    Full,
    /// Last frame of a finite source, zero-padded to full length.
    Padded,
    Exhausted,
    Cancelled,
    Failed(String),
}

fn fill_frame(
    audio: &mut dyn AudioSource,
    frame: &mut [i16],
    cancel: &AtomicBool,
    settings: &LoopSettings,
    stats: &mut SessionStats,
) -> Fill {
    let mut filled = 0;
    while filled < frame.len() {
        match audio.read(&mut frame[filled..]) {
            Ok(0) => {
                stats.short_reads += 1;
                if audio.is_finite() {
                    if filled == 0 {
                        return Fill::Exhausted;
                    }
                    frame[filled..].fill(0);
                    return Fill::Padded;
                }
                // Starved live device: a stop must not wait for audio that may never come
                if cancel.load(Ordering::SeqCst) {
                    if filled > 0 {
                        debug!("dropping {filled} buffered samples on cancel");
                    }
                    return Fill::Cancelled;
                }
                thread::sleep(settings.short_read_backoff);
            }
            Ok(n) => filled += n.min(frame.len() - filled),
            Err(e) => return Fill::Failed(e.to_string()),
        }
    }
    Fill::Full
}

/// Run the frame loop until cancelled, exhausted, or the device fails.
///
/// Every frame fed to the recognizer produces exactly one `Partial` or
/// `Final` event through `emit`. Incomplete frames are never fed, except
/// the zero-padded tail of a finite source.
pub fn run_frames(
    recognizer: &mut dyn Recognizer,
    audio: &mut dyn AudioSource,
    cancel: &AtomicBool,
    settings: &LoopSettings,
    emit: &mut dyn FnMut(TranscriptEvent),
) -> (LoopExit, SessionStats) {
    let started = Instant::now();
    let mut stats = SessionStats::default();
    let mut frame = vec![0i16; settings.frame_size.max(1)];

    let exit = loop {
        if cancel.load(Ordering::SeqCst) {
            break LoopExit::Cancelled;
        }

        let last = match fill_frame(audio, &mut frame, cancel, settings, &mut stats) {
            Fill::Full => false,
            Fill::Padded => true,
            Fill::Exhausted => break LoopExit::Exhausted,
            Fill::Cancelled => break LoopExit::Cancelled,
            Fill::Failed(message) => break LoopExit::DeviceError(message),
        };

        let result = classify_frame(recognizer, &frame);
        stats.frames += 1;
        if result.is_final() {
            stats.finals += 1;
        } else {
            stats.partials += 1;
        }
        trace!("frame {}: {:?}", stats.frames, result);
        emit(result.into_event());

        if last {
            break LoopExit::Exhausted;
        }
    };

    stats.duration = started.elapsed();
    debug!(
        "loop exit {:?}: {} frames ({} partial, {} final), {} short reads in {:?}",
        exit, stats.frames, stats.partials, stats.finals, stats.short_reads, stats.duration
    );
    (exit, stats)
}
