//! Default configuration constants for voxeval.
//!
//! Shared between the config layer, the audio sources and the engine so the
//! recognizer and the microphone always agree on the stream format.

/// Audio sample rate in Hz.
///
/// The Kaldi small models are trained on 16kHz mono audio.
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per frame fed to the recognizer.
///
/// 8192 samples is 512ms of audio at 16kHz.
pub const FRAME_SIZE: usize = 8192;

/// Upper bound on how long `stop()` waits for the transcription loop.
///
/// Must comfortably exceed one frame duration, since the in-flight frame is
/// always completed before the loop looks at the stop flag.
pub const STOP_GRACE_MS: u64 = 1000;

/// Pause between retries when the device delivers no samples.
pub const SHORT_READ_BACKOFF_MS: u64 = 10;

/// How long a live source blocks in `read` before reporting a starved device.
pub const READ_POLL_MS: u64 = 100;

/// Directory name of the default model bundle.
pub const DEFAULT_MODEL_NAME: &str = "vosk-model-small-en-in-0.4";

/// Sub-directory of the host download directory holding model bundles.
pub const MODELS_SUBDIR: &str = "vosk/models";

/// Duration of one frame in milliseconds at the given rate.
pub fn frame_duration_ms(frame_size: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    (frame_size as u64 * 1000) / sample_rate as u64
}
