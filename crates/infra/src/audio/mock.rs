//! Mock capture source for testing without hardware.

use super::device_buffer::DeviceBuffer;
use murmur_core::domain::audio::{AudioError, CaptureSource, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

struct MockState {
    buffer: DeviceBuffer,
    sample_rate: u32,
    started: AtomicBool,
    stopped: AtomicBool,
    failing_reads: AtomicUsize,
}

/// A capture source whose device buffer is filled by hand.
///
/// The source itself goes into the pipeline; the paired [`MockCaptureFeed`]
/// stays with the test and plays the role of the device callback.
///
/// # Example
///
/// ```
/// use murmur_infra::audio::MockCaptureSource;
///
/// let (source, feed) = MockCaptureSource::new(1, 44100, 44100);
/// feed.push(&[0.25, 0.5, 0.75]);
/// ```
pub struct MockCaptureSource {
    state: Arc<MockState>,
}

/// Test-side handle of a [`MockCaptureSource`]
#[derive(Clone)]
pub struct MockCaptureFeed {
    state: Arc<MockState>,
}

impl MockCaptureSource {
    /// Create a source with a device buffer of `capacity_frames` frames
    pub fn new(
        channels: u16,
        sample_rate: u32,
        capacity_frames: usize,
    ) -> (Self, MockCaptureFeed) {
        let state = Arc::new(MockState {
            buffer: DeviceBuffer::new(channels, capacity_frames),
            sample_rate,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            failing_reads: AtomicUsize::new(0),
        });

        (
            Self {
                state: Arc::clone(&state),
            },
            MockCaptureFeed { state },
        )
    }
}

impl MockCaptureFeed {
    /// Write interleaved frames as if the device had captured them
    pub fn push(&self, samples: &[f32]) {
        self.state.buffer.push_frames(samples);
    }

    /// Make the next `count` reads fail with a stream error
    pub fn fail_next_reads(&self, count: usize) {
        self.state.failing_reads.store(count, Ordering::Release);
    }

    pub fn channels(&self) -> u16 {
        self.state.buffer.channels()
    }

    pub fn is_started(&self) -> bool {
        self.state.started.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::Acquire)
    }
}

impl CaptureSource for MockCaptureSource {
    fn channels(&self) -> u16 {
        self.state.buffer.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.state.sample_rate
    }

    fn capacity_frames(&self) -> usize {
        self.state.buffer.capacity_frames()
    }

    fn position(&self) -> Option<usize> {
        self.state.buffer.position()
    }

    fn read_frames(&self, start: usize, out: &mut [f32]) -> Result<()> {
        let pending = self.state.failing_reads.load(Ordering::Acquire);
        if pending > 0 {
            self.state.failing_reads.store(pending - 1, Ordering::Release);
            return Err(AudioError::StreamError("injected read failure".to_string()));
        }
        self.state.buffer.read_frames(start, out)
    }

    fn start(&mut self) -> Result<()> {
        self.state.started.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.stopped.store(true, Ordering::Release);
    }
}
