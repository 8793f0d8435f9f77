//! CPAL input stream exposed as a looping capture buffer
//!
//! The input callback writes every frame into a [`DeviceBuffer`] that wraps
//! around after `buffer_secs` seconds; the pipeline only sees the buffer's
//! write position. The cpal stream itself lives on its own thread for as
//! long as capture runs, so the source can be handed to the capture worker.

use super::cpal_backend::{device_name, supported_input_channels, CpalDeviceResolver};
use super::device_buffer::DeviceBuffer;
use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam::channel::{bounded, Receiver, Sender};
use murmur_core::domain::audio::{AudioError, CaptureSource, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Pick the channel count to capture with.
///
/// The target count when the device supports it, otherwise mono to be
/// upmixed later. Anything else cannot be converted.
pub fn choose_capture_channels(supported: &[u16], target: u16) -> Result<u16> {
    if supported.contains(&target) {
        Ok(target)
    } else if supported.contains(&1) {
        Ok(1)
    } else {
        Err(AudioError::UnsupportedConfiguration(format!(
            "device supports {:?} channels, need {} or mono",
            supported, target
        )))
    }
}

struct RunningStream {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

/// Capture source backed by a cpal input device
pub struct CpalCaptureSource {
    device_name: String,
    channels: u16,
    sample_rate: u32,
    buffer: Arc<DeviceBuffer>,
    running: Option<RunningStream>,
}

impl CpalCaptureSource {
    /// Prepare capture from the input device named exactly `name`.
    ///
    /// Nothing is recorded until [`CaptureSource::start`].
    pub fn open(
        resolver: &CpalDeviceResolver,
        name: &str,
        target_channels: u16,
        sample_rate: u32,
        buffer_secs: u32,
    ) -> Result<Self> {
        let device = resolver.input_device(name)?;
        let supported = supported_input_channels(&device);
        let channels = choose_capture_channels(&supported, target_channels)?;

        if channels != target_channels {
            warn!(
                "Input device '{}' has no {}-channel mode, capturing mono",
                name, target_channels
            );
        }

        let capacity_frames = sample_rate as usize * buffer_secs.max(1) as usize;
        info!(
            device = %device_name(&device),
            channels,
            sample_rate,
            capacity_frames,
            "Opened input device"
        );

        Ok(Self {
            device_name: name.to_string(),
            channels,
            sample_rate,
            buffer: Arc::new(DeviceBuffer::new(channels, capacity_frames)),
            running: None,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn run_input_stream(
    name: String,
    config: cpal::StreamConfig,
    buffer: Arc<DeviceBuffer>,
    ready_tx: Sender<Result<()>>,
    stop_rx: Receiver<()>,
) {
    let stream = match build_input_stream(&name, &config, buffer) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    // Returns on an explicit stop or when the source is dropped
    let _ = stop_rx.recv();

    if let Err(e) = stream.pause() {
        debug!("Failed to pause input stream: {}", e);
    }
    drop(stream);
    debug!(device = %name, "Input stream closed");
}

fn build_input_stream(
    name: &str,
    config: &cpal::StreamConfig,
    buffer: Arc<DeviceBuffer>,
) -> Result<cpal::Stream> {
    let device = CpalDeviceResolver::new().input_device(name)?;

    let stream = device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                buffer.push_frames(data);
            },
            |err| error!("Input stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamError(format!("Failed to build stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))?;

    Ok(stream)
}

impl CaptureSource for CpalCaptureSource {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn capacity_frames(&self) -> usize {
        self.buffer.capacity_frames()
    }

    fn position(&self) -> Option<usize> {
        self.buffer.position()
    }

    fn read_frames(&self, start: usize, out: &mut [f32]) -> Result<()> {
        self.buffer.read_frames(start, out)
    }

    fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }

        self.buffer.reset();

        let config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let (ready_tx, ready_rx) = bounded(1);
        let (stop_tx, stop_rx) = bounded(1);
        let name = self.device_name.clone();
        let buffer = Arc::clone(&self.buffer);

        let thread = thread::Builder::new()
            .name("murmur-input".to_string())
            .spawn(move || run_input_stream(name, config, buffer, ready_tx, stop_rx))
            .map_err(|e| AudioError::OsError(format!("Failed to spawn input thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(device = %self.device_name, "Capture started");
                self.running = Some(RunningStream { stop_tx, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::StreamError(
                    "Input thread exited before the stream started".to_string(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.stop_tx.send(());
        if running.thread.join().is_err() {
            error!("Input thread panicked");
        }
        info!(device = %self.device_name, "Capture stopped");
    }
}

impl Drop for CpalCaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}
