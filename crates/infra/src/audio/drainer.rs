//! Capture drainer
//!
//! Bridges a capture source that only exposes "current write position in a
//! circular device buffer" to the chunked filter path. Each call to
//! [`CaptureDrainer::drain`] picks up every frame written since the last
//! call, in chunks no larger than the processing buffers, and pushes the
//! filtered result into the sample ring.

use super::ring_buffer::SampleRing;
use murmur_core::domain::audio::{AudioError, CaptureSource, ChannelLayout, Result};
use murmur_core::domain::control::FilterControl;
use murmur_core::domain::dsp::FilterEngine;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct CaptureDrainer<S: CaptureSource> {
    source: S,
    layout: ChannelLayout,
    filter: FilterEngine,
    ring: Arc<SampleRing>,

    /// Frame index in the device buffer up to which everything was consumed
    last_read: usize,

    frames_per_chunk: usize,

    // Pre-sized for one chunk so draining never allocates
    capture_buf: Vec<f32>,
    layout_buf: Vec<f32>,
    filtered_buf: Vec<f32>,
}

impl<S: CaptureSource> CaptureDrainer<S> {
    /// Build a drainer feeding `ring` with `target_channels`-channel audio.
    ///
    /// `chunk_size` is the processing chunk in frames; it is halved when a
    /// mono source is upmixed.
    pub fn new(
        source: S,
        target_channels: u16,
        chunk_size: usize,
        control: Arc<FilterControl>,
        ring: Arc<SampleRing>,
    ) -> Result<Self> {
        let layout = ChannelLayout::new(source.channels(), target_channels)?;
        let frames_per_chunk = layout.frames_per_chunk(chunk_size);

        let capture_len = frames_per_chunk * usize::from(layout.capture_channels());
        let target_len = frames_per_chunk * usize::from(layout.target_channels());

        debug!(
            capture_channels = layout.capture_channels(),
            target_channels = layout.target_channels(),
            frames_per_chunk,
            device_frames = source.capacity_frames(),
            "Capture drainer ready"
        );

        Ok(Self {
            filter: FilterEngine::new(target_channels, control),
            source,
            layout,
            ring,
            last_read: 0,
            frames_per_chunk,
            capture_buf: vec![0.0; capture_len],
            layout_buf: vec![0.0; target_len],
            filtered_buf: vec![0.0; target_len],
        })
    }

    /// Process every frame the device has written since the previous call.
    ///
    /// Returns the number of frames processed. A source that has not
    /// reported a position yet yields `Ok(0)`.
    pub fn drain(&mut self) -> Result<usize> {
        let Some(position) = self.source.position() else {
            return Ok(0);
        };

        let capacity = self.source.capacity_frames();
        if position >= capacity {
            return Err(AudioError::StreamError(format!(
                "capture position {position} outside a {capacity}-frame buffer"
            )));
        }

        let mut available = (position + capacity - self.last_read) % capacity;
        let mut processed = 0;

        while available > 0 {
            let frames = available.min(self.frames_per_chunk);

            self.read_chunk(frames, capacity)?;
            self.process_chunk(frames)?;

            self.last_read = (self.last_read + frames) % capacity;
            available -= frames;
            processed += frames;
        }

        if processed > 0 {
            trace!(processed, last_read = self.last_read, "Drained capture buffer");
        }
        Ok(processed)
    }

    /// Copy `frames` frames from `last_read` into the capture buffer,
    /// splitting the read when it runs past the end of the device buffer.
    fn read_chunk(&mut self, frames: usize, capacity: usize) -> Result<()> {
        let channels = usize::from(self.layout.capture_channels());
        let chunk = &mut self.capture_buf[..frames * channels];

        let tail_frames = capacity - self.last_read;
        if frames > tail_frames {
            let (tail, head) = chunk.split_at_mut(tail_frames * channels);
            self.source.read_frames(self.last_read, tail)?;
            self.source.read_frames(0, head)?;
        } else {
            self.source.read_frames(self.last_read, chunk)?;
        }
        Ok(())
    }

    fn process_chunk(&mut self, frames: usize) -> Result<()> {
        let channels = usize::from(self.layout.capture_channels());
        let samples = self
            .layout
            .convert(&self.capture_buf[..frames * channels], &mut self.layout_buf);

        self.filter
            .process(&self.layout_buf[..samples], &mut self.filtered_buf[..samples])?;
        self.ring.write(&self.filtered_buf[..samples]);
        Ok(())
    }

    pub fn last_read(&self) -> usize {
        self.last_read
    }

    pub fn frames_per_chunk(&self) -> usize {
        self.frames_per_chunk
    }

    pub fn filter(&self) -> &FilterEngine {
        &self.filter
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Give the capture source back, e.g. to stop it
    pub fn into_source(self) -> S {
        self.source
    }
}
