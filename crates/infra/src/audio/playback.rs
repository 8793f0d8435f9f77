//! Output side of the pipeline
//!
//! The playback sink is what the output device callback holds. It only ever
//! reads from the sample ring, so it is safe to call on the real-time thread.

use super::ring_buffer::SampleRing;
use std::sync::Arc;

/// Handle given to the output callback
#[derive(Clone, Debug)]
pub struct PlaybackSink {
    ring: Arc<SampleRing>,
    channels: u16,
}

impl PlaybackSink {
    pub fn new(ring: Arc<SampleRing>, channels: u16) -> Self {
        Self { ring, channels }
    }

    /// Fill an interleaved output block.
    ///
    /// Whatever is buffered is delivered in order and the remainder is
    /// silence. Returns the number of silent samples written.
    pub fn fill(&self, block: &mut [f32], channels: u16) -> usize {
        debug_assert_eq!(
            channels, self.channels,
            "output block has a different channel count than the pipeline"
        );
        let delivered = self.ring.read(block);
        block.len() - delivered
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Samples waiting to be played
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }
}
