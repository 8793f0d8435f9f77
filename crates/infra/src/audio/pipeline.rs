//! Capture → filter → ring buffer → playback pipeline
//!
//! [`Pipeline::start`] owns the capture side: it starts the source, waits
//! for the device to report a position and then runs the drainer on a
//! dedicated worker thread. The output side only needs the
//! [`PlaybackSink`] returned by [`Pipeline::sink`].

use super::drainer::CaptureDrainer;
use super::playback::PlaybackSink;
use super::ring_buffer::SampleRing;
use murmur_core::domain::audio::{AudioError, CaptureSource, Result};
use murmur_core::domain::config::MurmurConfig;
use murmur_core::domain::control::{CutoffPreset, FilterControl};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const STARTUP_POLL: Duration = Duration::from_millis(10);

/// Settings the pipeline needs from the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub channels: u16,
    pub chunk_size: usize,
    pub ring_capacity_samples: usize,
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&MurmurConfig> for PipelineSettings {
    fn from(config: &MurmurConfig) -> Self {
        Self {
            channels: config.audio.channels,
            chunk_size: config.audio.chunk_size,
            ring_capacity_samples: config.ring_capacity_samples(),
            startup_timeout: config.pipeline.startup_timeout(),
            poll_interval: config.pipeline.poll_interval(),
        }
    }
}

/// Point-in-time view of the running pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStatus {
    pub buffered_samples: usize,
    pub buffered_secs: f64,
    pub overruns: u64,
    pub underruns: u64,
    pub frames_captured: u64,
    pub cutoff_hz: f32,
    pub alpha: f32,
    pub filter_enabled: bool,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buffer status: {} samples ({:.3}s), overruns {}, underruns {}, filter {} at {:.1} Hz",
            self.buffered_samples,
            self.buffered_secs,
            self.overruns,
            self.underruns,
            if self.filter_enabled { "on" } else { "off" },
            self.cutoff_hz
        )
    }
}

/// Running capture pipeline
pub struct Pipeline<S: CaptureSource + 'static> {
    ring: Arc<SampleRing>,
    control: Arc<FilterControl>,
    channels: u16,
    stop: Arc<AtomicBool>,
    frames_captured: Arc<AtomicU64>,
    worker: Option<JoinHandle<CaptureDrainer<S>>>,
}

impl<S: CaptureSource + 'static> Pipeline<S> {
    /// Start capturing from `source` and processing on a worker thread.
    ///
    /// Fails with [`AudioError::CaptureStartTimeout`] when the source does
    /// not report a write position within the startup timeout, and with
    /// [`AudioError::UnsupportedConfiguration`] when the source runs at a
    /// different rate than the filter was tuned for. The source is stopped
    /// again on every error path.
    pub fn start(
        source: S,
        control: Arc<FilterControl>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        if source.sample_rate() != control.sample_rate() {
            return Err(AudioError::UnsupportedConfiguration(format!(
                "capture runs at {} Hz but the filter expects {} Hz",
                source.sample_rate(),
                control.sample_rate()
            )));
        }

        info!(
            channels = settings.channels,
            chunk_size = settings.chunk_size,
            ring_capacity = settings.ring_capacity_samples,
            "Starting pipeline"
        );

        let ring = Arc::new(SampleRing::with_capacity(settings.ring_capacity_samples));
        let mut drainer = CaptureDrainer::new(
            source,
            settings.channels,
            settings.chunk_size,
            Arc::clone(&control),
            Arc::clone(&ring),
        )?;

        drainer.source_mut().start()?;

        if let Err(e) = wait_for_position(drainer.source(), settings.startup_timeout) {
            drainer.source_mut().stop();
            return Err(e);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let frames_captured = Arc::new(AtomicU64::new(0));

        let worker = {
            let stop = Arc::clone(&stop);
            let frames_captured = Arc::clone(&frames_captured);
            let poll_interval = settings.poll_interval;
            thread::Builder::new()
                .name("murmur-capture".to_string())
                .spawn(move || capture_loop(drainer, &stop, &frames_captured, poll_interval))
                .map_err(|e| AudioError::OsError(format!("Failed to spawn capture worker: {}", e)))?
        };

        info!("Pipeline running");

        Ok(Self {
            ring,
            control,
            channels: settings.channels,
            stop,
            frames_captured,
            worker: Some(worker),
        })
    }

    /// Handle for the output callback
    pub fn sink(&self) -> PlaybackSink {
        PlaybackSink::new(Arc::clone(&self.ring), self.channels)
    }

    pub fn control(&self) -> &Arc<FilterControl> {
        &self.control
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns the cutoff actually applied after clamping
    pub fn set_cutoff_frequency(&self, cutoff_hz: f32) -> f32 {
        self.control.set_cutoff(cutoff_hz)
    }

    pub fn apply_preset(&self, preset: CutoffPreset) -> f32 {
        self.control.apply_preset(preset)
    }

    /// Returns whether the filter is now enabled
    pub fn toggle_filter(&self) -> bool {
        self.control.toggle_enabled()
    }

    /// Audio waiting in the ring buffer, in playback time
    pub fn buffered_duration(&self) -> Duration {
        Duration::from_secs_f64(self.buffered_secs(self.ring.len()))
    }

    fn buffered_secs(&self, samples: usize) -> f64 {
        let per_sec = f64::from(self.control.sample_rate()) * f64::from(self.channels);
        if per_sec > 0.0 {
            samples as f64 / per_sec
        } else {
            0.0
        }
    }

    pub fn status(&self) -> PipelineStatus {
        let buffered_samples = self.ring.len();
        PipelineStatus {
            buffered_samples,
            buffered_secs: self.buffered_secs(buffered_samples),
            overruns: self.ring.overruns(),
            underruns: self.ring.underruns(),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            cutoff_hz: self.control.cutoff(),
            alpha: self.control.alpha(),
            filter_enabled: self.control.is_enabled(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop the worker and the capture source. Idempotent.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        info!("Stopping pipeline");
        self.stop.store(true, Ordering::Release);

        match worker.join() {
            Ok(drainer) => {
                let mut source = drainer.into_source();
                source.stop();
                debug!("Capture source stopped");
            }
            Err(_) => error!("Capture worker panicked"),
        }
    }
}

impl<S: CaptureSource + 'static> Drop for Pipeline<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn wait_for_position<S: CaptureSource>(source: &S, timeout: Duration) -> Result<()> {
    let started = Instant::now();
    loop {
        if let Some(position) = source.position() {
            debug!(
                position,
                waited_ms = started.elapsed().as_millis() as u64,
                "Capture position available"
            );
            return Ok(());
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            error!(waited_ms = timeout.as_millis() as u64, "Capture did not start");
            return Err(AudioError::CaptureStartTimeout {
                waited_ms: timeout.as_millis() as u64,
            });
        }
        thread::sleep(STARTUP_POLL.min(timeout - elapsed));
    }
}

fn capture_loop<S: CaptureSource>(
    mut drainer: CaptureDrainer<S>,
    stop: &AtomicBool,
    frames_captured: &AtomicU64,
    poll_interval: Duration,
) -> CaptureDrainer<S> {
    debug!("Capture worker started");
    let mut consecutive_errors: u32 = 0;

    while !stop.load(Ordering::Acquire) {
        match drainer.drain() {
            Ok(frames) => {
                if consecutive_errors > 0 {
                    info!(failed_iterations = consecutive_errors, "Capture recovered");
                    consecutive_errors = 0;
                }
                frames_captured.fetch_add(frames as u64, Ordering::Relaxed);
            }
            Err(e) => {
                consecutive_errors = consecutive_errors.saturating_add(1);
                // First failure, then back off to powers of two
                if consecutive_errors.is_power_of_two() {
                    error!(error = %e, consecutive_errors, "Capture iteration failed");
                }
            }
        }
        thread::sleep(poll_interval);
    }

    debug!("Capture worker exiting");
    drainer
}
