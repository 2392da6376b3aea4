use crate::error::{Result, VoxevalError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read up to `buf.len()` 16-bit PCM samples into `buf`.
    ///
    /// Blocks for at most a short poll interval. Returns the number of samples
    /// written; `Ok(0)` means the device is starved (live source) or the
    /// stream is exhausted (finite source).
    fn read(&mut self, buf: &mut [i16]) -> Result<usize>;

    /// Whether this source ends on its own (file, pipe) rather than
    /// producing audio until stopped.
    fn is_finite(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct ProbeCounters {
    starts: AtomicUsize,
    stops: AtomicUsize,
    reads: AtomicUsize,
    samples: AtomicUsize,
}

/// Shared view of a mock source's activity, readable after the source has
/// been moved into an engine.
#[derive(Debug, Clone, Default)]
pub struct AudioProbe(Arc<ProbeCounters>);

impl AudioProbe {
    pub fn starts(&self) -> usize {
        self.0.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.0.stops.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.0.reads.load(Ordering::SeqCst)
    }

    /// Total samples handed out by `read`.
    pub fn samples(&self) -> usize {
        self.0.samples.load(Ordering::SeqCst)
    }
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    sample_value: i16,
    samples_per_read: Option<usize>,
    total_samples: Option<usize>,
    delivered: usize,
    starve_every: Option<usize>,
    starve_after: Option<usize>,
    fail_read_after: Option<usize>,
    read_delay: Duration,
    should_fail_start: bool,
    should_fail_stop: bool,
    error_message: String,
    probe: AudioProbe,
}

impl MockAudioSource {
    /// Create a new mock audio source that fills every read completely
    pub fn new() -> Self {
        Self {
            is_started: false,
            sample_value: 0,
            samples_per_read: None,
            total_samples: None,
            delivered: 0,
            starve_every: None,
            starve_after: None,
            fail_read_after: None,
            read_delay: Duration::ZERO,
            should_fail_start: false,
            should_fail_stop: false,
            error_message: "mock audio error".to_string(),
            probe: AudioProbe::default(),
        }
    }

    /// Fill delivered samples with this value
    pub fn with_sample_value(mut self, value: i16) -> Self {
        self.sample_value = value;
        self
    }

    /// Deliver at most `n` samples per read, forcing short reads
    pub fn with_samples_per_read(mut self, n: usize) -> Self {
        self.samples_per_read = Some(n.max(1));
        self
    }

    /// Make the source finite: it is exhausted after `n` samples
    pub fn with_total_samples(mut self, n: usize) -> Self {
        self.total_samples = Some(n);
        self
    }

    /// Every `n`-th read returns no samples, as a briefly starved device does
    pub fn with_starved_reads_every(mut self, n: usize) -> Self {
        self.starve_every = Some(n.max(1));
        self
    }

    /// After `n` reads the device never delivers again
    pub fn with_starvation_after(mut self, n: usize) -> Self {
        self.starve_after = Some(n);
        self
    }

    /// Reads after the first `n` fail with a device read error
    pub fn with_read_failure_after(mut self, n: usize) -> Self {
        self.fail_read_after = Some(n);
        self
    }

    /// Sleep this long inside every read, as a real-time device does
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on stop
    pub fn with_stop_failure(mut self) -> Self {
        self.should_fail_stop = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Handle for observing this source after it has been moved.
    pub fn probe(&self) -> AudioProbe {
        self.probe.clone()
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(VoxevalError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        self.is_started = true;
        self.probe.0.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.should_fail_stop {
            return Err(VoxevalError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        self.is_started = false;
        self.probe.0.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
        let read_index = self.probe.0.reads.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }

        if let Some(limit) = self.fail_read_after
            && read_index > limit
        {
            return Err(VoxevalError::DeviceRead {
                message: self.error_message.clone(),
            });
        }

        if let Some(limit) = self.starve_after
            && read_index > limit
        {
            return Ok(0);
        }

        if let Some(every) = self.starve_every
            && read_index % every == 0
        {
            return Ok(0);
        }

        let mut n = buf.len();
        if let Some(per_read) = self.samples_per_read {
            n = n.min(per_read);
        }
        if let Some(total) = self.total_samples {
            n = n.min(total.saturating_sub(self.delivered));
        }

        buf[..n].fill(self.sample_value);
        self.delivered += n;
        self.probe.0.samples.fetch_add(n, Ordering::SeqCst);
        Ok(n)
    }

    fn is_finite(&self) -> bool {
        self.total_samples.is_some()
    }
}
