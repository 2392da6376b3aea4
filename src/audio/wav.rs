//! WAV file audio source for offline transcription.

use crate::audio::source::AudioSource;
use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, VoxevalError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Audio source that reads from WAV file data.
/// Supports arbitrary sample rates and channels, resampling to 16kHz mono.
pub struct WavAudioSource {
    samples: Vec<i16>,
    position: usize,
}

impl WavAudioSource {
    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Result<Self> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| VoxevalError::AudioCapture {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(VoxevalError::AudioCapture {
                message: format!(
                    "Unsupported WAV format: {}-bit {:?}, expected 16-bit PCM",
                    spec.bits_per_sample, spec.sample_format
                ),
            });
        }
        let source_rate = spec.sample_rate;
        let source_channels = spec.channels as usize;
        if source_channels == 0 {
            return Err(VoxevalError::AudioCapture {
                message: "WAV file declares zero channels".to_string(),
            });
        }

        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VoxevalError::AudioCapture {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        let mono_samples = downmix(&raw_samples, source_channels);

        let samples = if source_rate != SAMPLE_RATE {
            resample(&mono_samples, source_rate, SAMPLE_RATE)
        } else {
            mono_samples
        };

        Ok(Self {
            samples,
            position: 0,
        })
    }

    /// Open a WAV file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| VoxevalError::AudioCapture {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(Box::new(BufReader::new(file)))
    }

    /// Number of 16kHz mono samples in the file.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Consume the source and return all samples as a single buffer.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

impl AudioSource for WavAudioSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
        let remaining = self.samples.len().saturating_sub(self.position);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&self.samples[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Average interleaved channels down to mono.
pub(crate) fn downmix(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub(crate) fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
