//! Microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::source::AudioSource;
use crate::audio::wav::{downmix, resample};
use crate::defaults;
use crate::error::{Result, VoxevalError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Preferred device names for PipeWire/PulseAudio desktops.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns to filter out (not useful for voice input).
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List available audio input devices, marking preferred ones with
/// "\[recommended\]" and skipping outputs that are useless for voice input.
pub fn list_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| VoxevalError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Get the best default input device, preferring PipeWire/PulseAudio over
/// the raw system default.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| VoxevalError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: The stream is created, played, paused and dropped only through
/// `&mut CpalAudioSource`, so it is never touched from two threads at once.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Samples delivered by the stream callback, waiting for `read`.
#[derive(Default)]
struct SampleQueue {
    samples: Mutex<VecDeque<i16>>,
    available: Condvar,
}

impl SampleQueue {
    fn push(&self, data: &[i16]) {
        if let Ok(mut queue) = self.samples.lock() {
            queue.extend(data.iter().copied());
            self.available.notify_one();
        }
    }

    fn clear(&self) {
        if let Ok(mut queue) = self.samples.lock() {
            queue.clear();
        }
    }
}

/// Real microphone capture using CPAL.
///
/// Captures 16-bit PCM audio at 16kHz mono. Tries the preferred format first
/// (i16/16kHz/mono), then f32, then falls back to the device's default config
/// with software conversion (channel mixing + resampling).
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Option<SendableStream>,
    queue: Arc<SampleQueue>,
    callback_count: Arc<AtomicU64>,
    sample_rate: u32,
    poll: Duration,
}

impl CpalAudioSource {
    /// Open an input device by name, or the preferred default when `None`.
    ///
    /// The device handle is allocated but capture does not begin until
    /// [`AudioSource::start`].
    pub fn new(device_name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices = host
                    .input_devices()
                    .map_err(|e| VoxevalError::AudioCapture {
                        message: format!("Failed to enumerate devices: {}", e),
                    })?;

                let mut found_device = None;
                for dev in devices {
                    if let Ok(dev_name) = dev.name()
                        && dev_name == name
                    {
                        found_device = Some(dev);
                        break;
                    }
                }

                found_device.ok_or_else(|| VoxevalError::AudioDeviceNotFound {
                    device: name.to_string(),
                })
            } else {
                get_best_default_device()
            }
        })?;

        if let Ok(name) = device.name() {
            debug!(device = %name, sample_rate, "opened audio input device");
        }

        Ok(Self {
            device,
            stream: None,
            queue: Arc::new(SampleQueue::default()),
            callback_count: Arc::new(AtomicU64::new(0)),
            sample_rate,
            poll: Duration::from_millis(defaults::READ_POLL_MS),
        })
    }

    /// Build the input stream: i16/16kHz/mono, then f32/16kHz/mono, then
    /// the device's native config converted in software.
    fn build_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            warn!("audio stream error: {}", err);
        };

        let queue = Arc::clone(&self.queue);
        let counter = Arc::clone(&self.callback_count);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                queue.push(data);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        let queue = Arc::clone(&self.queue);
        let counter = Arc::clone(&self.callback_count);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                let converted: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                queue.push(&converted);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        self.build_stream_native()
    }

    /// Build a stream using the device's native config, with software
    /// channel mixing and resampling to the target rate.
    fn build_stream_native(&self) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| VoxevalError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        debug!(
            channels = native_channels,
            rate = native_rate,
            format = ?default_config.sample_format(),
            "using native audio format, converting in software"
        );

        let err_callback = |err| {
            warn!("audio stream error: {}", err);
        };

        let queue = Arc::clone(&self.queue);
        let counter = Arc::clone(&self.callback_count);

        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let mono = downmix(data, native_channels);
                        queue.push(&resample(&mono, native_rate, target_rate));
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| VoxevalError::AudioCapture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let i16_data: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                        let mono = downmix(&i16_data, native_channels);
                        queue.push(&resample(&mono, native_rate, target_rate));
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| VoxevalError::AudioCapture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            fmt => Err(VoxevalError::AudioCapture {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try selecting another device in the config.",
                    fmt
                ),
            }),
        }
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        self.queue.clear();
        self.callback_count.store(0, Ordering::Relaxed);

        let stream = self.build_stream()?;
        stream.play().map_err(|e| VoxevalError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        // Some PipeWire-ALSA setups accept non-native configs but never
        // deliver data; give the callback a moment to prove itself.
        std::thread::sleep(Duration::from_millis(200));

        let stream = if self.callback_count.load(Ordering::Relaxed) == 0 {
            drop(stream);
            self.queue.clear();

            let native_stream = self.build_stream_native()?;
            native_stream
                .play()
                .map_err(|e| VoxevalError::AudioCapture {
                    message: format!("Failed to start native audio stream: {}", e),
                })?;
            native_stream
        } else {
            stream
        };

        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream.0.pause().map_err(|e| VoxevalError::AudioCapture {
                message: format!("Failed to stop audio stream: {}", e),
            })?;
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
        let queue = self
            .queue
            .samples
            .lock()
            .map_err(|e| VoxevalError::DeviceRead {
                message: format!("Failed to lock audio buffer: {}", e),
            })?;

        let (mut queue, _) = self
            .queue
            .available
            .wait_timeout_while(queue, self.poll, |q| q.is_empty())
            .map_err(|e| VoxevalError::DeviceRead {
                message: format!("Failed to wait for audio: {}", e),
            })?;

        let n = queue.len().min(buf.len());
        for (slot, sample) in buf.iter_mut().zip(queue.drain(..n)) {
            *slot = sample;
        }
        Ok(n)
    }
}
