//! Looping capture buffer filled by an input device
//!
//! Mirrors how capture APIs with a looping clip behave: the device writes
//! frames into a fixed-size circular buffer and only publishes its current
//! write position. Readers keep their own cursor and copy frames out.

use murmur_core::domain::audio::{AudioError, Result};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

pub struct DeviceBuffer {
    slots: Box<[AtomicU32]>,
    channels: usize,
    capacity_frames: usize,
    position: AtomicUsize,
    started: AtomicBool,
}

impl DeviceBuffer {
    pub fn new(channels: u16, capacity_frames: usize) -> Self {
        let channels = usize::from(channels.max(1));
        let capacity_frames = capacity_frames.max(1);
        Self {
            slots: (0..channels * capacity_frames)
                .map(|_| AtomicU32::new(0))
                .collect(),
            channels,
            capacity_frames,
            position: AtomicUsize::new(0),
            started: AtomicBool::new(false),
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    /// Write interleaved frames at the current position, wrapping at the end.
    ///
    /// Single writer only. A trailing partial frame is ignored.
    pub fn push_frames(&self, samples: &[f32]) {
        let mut position = self.position.load(Ordering::Relaxed);

        for frame in samples.chunks_exact(self.channels) {
            let base = position * self.channels;
            for (slot, &sample) in self.slots[base..base + self.channels].iter().zip(frame) {
                slot.store(sample.to_bits(), Ordering::Relaxed);
            }
            position = (position + 1) % self.capacity_frames;
        }

        self.position.store(position, Ordering::Release);
        self.started.store(true, Ordering::Release);
    }

    /// Next frame the device will write, `None` before the first callback
    pub fn position(&self) -> Option<usize> {
        if self.started.load(Ordering::Acquire) {
            Some(self.position.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Copy frames `[start, start + out.len() / channels)` into `out`
    pub fn read_frames(&self, start: usize, out: &mut [f32]) -> Result<()> {
        if out.len() % self.channels != 0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "read of {} samples is not a whole number of {}-channel frames",
                out.len(),
                self.channels
            )));
        }

        let frames = out.len() / self.channels;
        if start + frames > self.capacity_frames {
            return Err(AudioError::StreamError(format!(
                "read of {frames} frames at {start} crosses the end of a {}-frame buffer",
                self.capacity_frames
            )));
        }

        let base = start * self.channels;
        let len = out.len();
        for (sample, slot) in out.iter_mut().zip(&self.slots[base..base + len]) {
            *sample = f32::from_bits(slot.load(Ordering::Relaxed));
        }
        Ok(())
    }

    /// Forget everything written and wait for the device again
    pub fn reset(&self) {
        self.started.store(false, Ordering::Release);
        self.position.store(0, Ordering::Release);
    }
}
