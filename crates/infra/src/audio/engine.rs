//! Real-time passthrough engine
//!
//! Wires the pieces together on real hardware: resolves the configured
//! devices, starts the capture pipeline and plays the ring buffer through a
//! cpal output stream.

use super::capture::CpalCaptureSource;
use super::cpal_backend::CpalDeviceResolver;
use super::pipeline::{Pipeline, PipelineSettings};
use super::playback::PlaybackSink;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig as CpalStreamConfig};
use murmur_core::domain::audio::{
    resolve_input_device, resolve_output_device, AudioError, CaptureSource, DeviceFallback,
    DeviceSelection, Result,
};
use murmur_core::domain::config::MurmurConfig;
use murmur_core::domain::control::FilterControl;
use std::sync::Arc;
use tracing::{error, info};

/// What the engine ended up using
#[derive(Debug, Clone)]
pub struct StartReport {
    pub input: DeviceSelection,
    pub output: DeviceSelection,
    pub capture_channels: u16,
}

impl StartReport {
    /// Devices that were substituted for the configured ones
    pub fn fallbacks(&self) -> impl Iterator<Item = &DeviceFallback> {
        self.input
            .fallback
            .iter()
            .chain(self.output.fallback.iter())
    }
}

/// Running capture → filter → playback chain on cpal devices
pub struct PassthroughEngine {
    pipeline: Pipeline<CpalCaptureSource>,
    output: Option<Stream>,
    report: StartReport,
}

impl PassthroughEngine {
    pub fn start(config: &MurmurConfig) -> Result<Self> {
        let audio = &config.audio;
        let resolver = CpalDeviceResolver::new();

        let input = resolve_input_device(&resolver, &audio.input_device)?;
        let output = resolve_output_device(&resolver, audio.output_device.as_deref())?;
        info!(input = %input.device.name, output = %output.device.name, "Devices selected");

        let source = CpalCaptureSource::open(
            &resolver,
            &input.device.name,
            audio.channels,
            audio.sample_rate,
            config.pipeline.capture_buffer_secs,
        )?;
        let capture_channels = source.channels();

        let control = Arc::new(FilterControl::new(
            audio.sample_rate,
            config.filter.cutoff_hz,
            config.filter.enabled,
        ));
        let mut pipeline = Pipeline::start(source, control, PipelineSettings::from(config))?;

        let stream = match resolver
            .output_device(&output.device.name)
            .and_then(|device| {
                build_output_stream(&device, audio.channels, audio.sample_rate, pipeline.sink())
            }) {
            Ok(stream) => stream,
            Err(e) => {
                pipeline.stop();
                return Err(e);
            }
        };

        info!("Passthrough running");

        Ok(Self {
            pipeline,
            output: Some(stream),
            report: StartReport {
                input,
                output,
                capture_channels,
            },
        })
    }

    pub fn pipeline(&self) -> &Pipeline<CpalCaptureSource> {
        &self.pipeline
    }

    pub fn report(&self) -> &StartReport {
        &self.report
    }

    /// Stop capture first, then release the output device
    pub fn stop(&mut self) {
        self.pipeline.stop();
        if self.output.take().is_some() {
            info!("Output stream closed");
        }
    }
}

impl Drop for PassthroughEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_output_stream(
    device: &cpal::Device,
    channels: u16,
    sample_rate: u32,
    sink: PlaybackSink,
) -> Result<Stream> {
    let config = CpalStreamConfig {
        channels,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                sink.fill(data, channels);
            },
            |err| error!("Output stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamError(format!("Failed to build stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))?;

    Ok(stream)
}
