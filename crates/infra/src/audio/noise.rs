//! White-noise test sender
//!
//! Streams uniform white noise to an output device, typically a loopback
//! device whose input side feeds the passthrough.

use super::cpal_backend::CpalDeviceResolver;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig as CpalStreamConfig};
use murmur_core::domain::audio::{resolve_output_device, AudioError, DeviceSelection, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info};

/// Fill `block` with uniform noise in `[-amplitude, amplitude)`
pub fn fill_noise<R: Rng + ?Sized>(rng: &mut R, block: &mut [f32], amplitude: f32) {
    for sample in block.iter_mut() {
        *sample = (rng.gen::<f32>() * 2.0 - 1.0) * amplitude;
    }
}

/// Output stream playing white noise until dropped
pub struct NoiseSender {
    _stream: Stream,
    selection: DeviceSelection,
}

impl NoiseSender {
    /// Start streaming to the output device whose name contains `device`.
    ///
    /// Falls back to the default output when nothing matches.
    pub fn start(device: &str, channels: u16, sample_rate: u32, amplitude: f32) -> Result<Self> {
        let resolver = CpalDeviceResolver::new();
        let selection = resolve_output_device(&resolver, Some(device))?;
        let cpal_device = resolver.output_device(&selection.device.name)?;

        let config = CpalStreamConfig {
            channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        let amplitude = amplitude.clamp(0.0, 1.0);
        let mut rng = StdRng::from_entropy();

        let stream = cpal_device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_noise(&mut rng, data, amplitude);
                },
                |err| error!("Noise stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))?;

        info!("Streaming white noise to device '{}'", selection.device.name);

        Ok(Self {
            _stream: stream,
            selection,
        })
    }

    pub fn selection(&self) -> &DeviceSelection {
        &self.selection
    }
}
