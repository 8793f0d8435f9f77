//! Platform-specific audio backend implementations using CPAL
//!
//! CPAL abstracts the platform APIs:
//! - Windows: WASAPI
//! - Linux: ALSA/PulseAudio
//! - macOS: CoreAudio
//!
//! Everything below the cpal boundary (ring, drainer, sink, pipeline) is
//! hardware-independent and is exercised with [`MockCaptureSource`].

pub mod capture;
pub mod cpal_backend;
pub mod device_buffer;
pub mod drainer;
pub mod engine;
pub mod mock;
pub mod noise;
pub mod pipeline;
pub mod playback;
pub mod ring_buffer;

pub use capture::CpalCaptureSource;
pub use cpal_backend::CpalDeviceResolver;
pub use device_buffer::DeviceBuffer;
pub use drainer::CaptureDrainer;
pub use engine::{PassthroughEngine, StartReport};
pub use mock::{MockCaptureFeed, MockCaptureSource};
pub use noise::{fill_noise, NoiseSender};
pub use pipeline::{Pipeline, PipelineSettings, PipelineStatus};
pub use playback::PlaybackSink;
pub use ring_buffer::SampleRing;
