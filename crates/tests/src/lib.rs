//! Shared helpers for the Murmur integration tests

use murmur_core::domain::control::FilterControl;
use murmur_infra::audio::{
    MockCaptureFeed, MockCaptureSource, Pipeline, PipelineSettings, PlaybackSink,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const SAMPLE_RATE: u32 = 44100;

pub fn sine_wave(frequency: f32, sample_rate: u32, samples: usize) -> Vec<f32> {
    (0..samples)
        .map(|i| 2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32)
        .map(|phase| phase.sin())
        .collect()
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

pub fn settings(channels: u16, chunk_size: usize) -> PipelineSettings {
    PipelineSettings {
        channels,
        chunk_size,
        ring_capacity_samples: 1 << 16,
        startup_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(1),
    }
}

/// A pipeline over a mock source, plus the handles a test drives it with
pub struct Harness {
    pub pipeline: Pipeline<MockCaptureSource>,
    pub feed: MockCaptureFeed,
    pub sink: PlaybackSink,
}

impl Harness {
    /// Start a pipeline whose source already reports a position
    pub fn start(
        capture_channels: u16,
        settings: PipelineSettings,
        cutoff_hz: f32,
        enabled: bool,
    ) -> Self {
        let (source, feed) =
            MockCaptureSource::new(capture_channels, SAMPLE_RATE, SAMPLE_RATE as usize);
        // Zero-length push marks the device as started without writing frames
        feed.push(&[]);

        let control = Arc::new(FilterControl::new(SAMPLE_RATE, cutoff_hz, enabled));
        let pipeline = Pipeline::start(source, control, settings).expect("pipeline starts");
        let sink = pipeline.sink();

        Self {
            pipeline,
            feed,
            sink,
        }
    }

    /// Push frames and wait until the worker has processed them
    pub fn capture(&self, samples: &[f32]) {
        let before = self.pipeline.status().frames_captured;
        let frames = (samples.len() / self.feed_channels()) as u64;
        self.feed.push(samples);
        assert!(
            wait_until(|| self.pipeline.status().frames_captured >= before + frames),
            "worker did not process {} frames",
            frames
        );
    }

    /// Read `samples` interleaved samples through the playback sink
    pub fn play(&self, samples: usize) -> Vec<f32> {
        let mut block = vec![0.0; samples];
        self.sink.fill(&mut block, self.sink.channels());
        block
    }

    fn feed_channels(&self) -> usize {
        self.feed.channels() as usize
    }
}

pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}
