//! Audio input: the `AudioSource` seam and its implementations.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod source;
pub mod wav;

pub use source::{AudioProbe, AudioSource, MockAudioSource};
pub use wav::WavAudioSource;
