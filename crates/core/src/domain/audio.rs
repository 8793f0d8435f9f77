//! Audio device abstractions and domain models
//!
//! This module defines the collaborator interfaces the pipeline depends on:
//! a capture source exposing a wraparound device buffer, and a resolver that
//! maps a configured device name onto an actual device. Implementations for
//! real hardware (CPAL) live in the `infra` crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur in the audio subsystem
#[derive(Debug, Error)]
pub enum AudioError {
    /// Requested audio device was not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// No usable device at all (requested name absent and nothing to fall back to)
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Capture never reported a valid position during startup
    #[error("Capture did not start within {waited_ms} ms")]
    CaptureStartTimeout { waited_ms: u64 },

    /// Error in audio stream creation or processing
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Invalid configuration for audio device
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Input/Output error at the OS level
    #[error("OS error: {0}")]
    OsError(String),

    /// Device or layout does not support the requested configuration
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Unique identifier for an audio device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Audio sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    Hz44100,
    Hz48000,
    Hz96000,
    Custom(u32),
}

impl SampleRate {
    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
            SampleRate::Hz96000 => 96000,
            SampleRate::Custom(hz) => *hz,
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        match hz {
            44100 => SampleRate::Hz44100,
            48000 => SampleRate::Hz48000,
            96000 => SampleRate::Hz96000,
            hz => SampleRate::Custom(hz),
        }
    }
}

/// Number of audio channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCount {
    Mono,
    Stereo,
    Surround(u16),
}

impl ChannelCount {
    pub fn count(&self) -> u16 {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
            ChannelCount::Surround(n) => *n,
        }
    }

    pub fn from_count(count: u16) -> Self {
        match count {
            1 => ChannelCount::Mono,
            2 => ChannelCount::Stereo,
            n => ChannelCount::Surround(n),
        }
    }
}

/// Capture channel count versus the channel count the pipeline runs at.
///
/// Equal counts pass straight through. A mono capture feeding a wider
/// target is upmixed by duplicating every sample into each target channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    capture: u16,
    target: u16,
}

impl ChannelLayout {
    pub fn new(capture: u16, target: u16) -> Result<Self> {
        if capture == 0 || target == 0 {
            return Err(AudioError::InvalidConfiguration(
                "channel count must be at least 1".to_string(),
            ));
        }
        if capture != target && capture != 1 {
            return Err(AudioError::UnsupportedConfiguration(format!(
                "cannot convert {capture} capture channels to {target}"
            )));
        }
        Ok(Self { capture, target })
    }

    pub fn capture_channels(&self) -> u16 {
        self.capture
    }

    pub fn target_channels(&self) -> u16 {
        self.target
    }

    pub fn is_upmix(&self) -> bool {
        self.capture != self.target
    }

    /// Frames that may be pulled from the device per processing chunk.
    ///
    /// Halved when upmixing so the expanded chunk stays within the
    /// fixed-size processing buffers.
    pub fn frames_per_chunk(&self, chunk_size: usize) -> usize {
        if self.is_upmix() {
            (chunk_size / 2).max(1)
        } else {
            chunk_size.max(1)
        }
    }

    /// Convert captured interleaved samples to the target layout.
    ///
    /// Returns the number of samples written to `output`, which must hold
    /// at least `input.len() / capture * target` samples.
    pub fn convert(&self, input: &[f32], output: &mut [f32]) -> usize {
        if !self.is_upmix() {
            output[..input.len()].copy_from_slice(input);
            return input.len();
        }

        let target = self.target as usize;
        for (frame, &sample) in output.chunks_exact_mut(target).zip(input) {
            frame.fill(sample);
        }
        input.len() * target
    }
}

/// Type of audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Input,
    Output,
    Duplex,
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub device_type: DeviceType,
    pub channel_counts: Vec<ChannelCount>,
    pub default_sample_rate: Option<SampleRate>,
}

/// A capture device exposing its own fixed-size circular buffer.
///
/// The device writes frames into the buffer autonomously and reports the
/// absolute frame index it will write next. Consumers track their own read
/// position and pull the frames in between.
pub trait CaptureSource: Send {
    /// Channels per captured frame
    fn channels(&self) -> u16;

    /// Rate at which the device produces frames
    fn sample_rate(&self) -> u32;

    /// Size of the device buffer in frames
    fn capacity_frames(&self) -> usize;

    /// Current write position in frames, or `None` while the device has not
    /// produced anything yet
    fn position(&self) -> Option<usize>;

    /// Copy `out.len() / channels` frames starting at frame `start`.
    ///
    /// The range must not cross the end of the device buffer.
    fn read_frames(&self, start: usize, out: &mut [f32]) -> Result<()>;

    /// Begin capturing
    fn start(&mut self) -> Result<()>;

    /// Stop capturing and release the device
    fn stop(&mut self);
}

/// Trait for enumerating audio devices
pub trait DeviceResolver: Send + Sync {
    /// All devices able to capture
    fn input_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// All devices able to play back
    fn output_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// The system's default playback device
    fn default_output_device(&self) -> Result<DeviceInfo>;
}

/// Non-fatal notice that the requested device was replaced by another one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFallback {
    pub requested: String,
    pub used: String,
}

impl fmt::Display for DeviceFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device '{}' not found, using '{}'",
            self.requested, self.used
        )
    }
}

/// Outcome of resolving a configured device name
#[derive(Debug, Clone)]
pub struct DeviceSelection {
    pub device: DeviceInfo,
    pub fallback: Option<DeviceFallback>,
}

fn matches_name(device: &DeviceInfo, requested: &str) -> bool {
    device
        .name
        .to_lowercase()
        .contains(&requested.to_lowercase())
}

/// Pick the input device whose name contains `requested` (case-insensitive).
///
/// Falls back to the first available input device with a warning, and fails
/// only when there are no input devices at all.
pub fn resolve_input_device(
    resolver: &dyn DeviceResolver,
    requested: &str,
) -> Result<DeviceSelection> {
    let devices = resolver.input_devices()?;
    for device in &devices {
        debug!(name = %device.name, "Available input device");
    }

    if let Some(device) = devices.iter().find(|d| matches_name(d, requested)) {
        return Ok(DeviceSelection {
            device: device.clone(),
            fallback: None,
        });
    }

    let device = devices.into_iter().next().ok_or_else(|| {
        AudioError::DeviceUnavailable(format!(
            "input device '{requested}' not found and no input devices are available"
        ))
    })?;

    let fallback = DeviceFallback {
        requested: requested.to_string(),
        used: device.name.clone(),
    };
    warn!("{}", fallback);

    Ok(DeviceSelection {
        device,
        fallback: Some(fallback),
    })
}

/// Pick the output device whose name contains `requested`.
///
/// `None` selects the system default. A name that matches nothing also
/// falls back to the default output, with a warning.
pub fn resolve_output_device(
    resolver: &dyn DeviceResolver,
    requested: Option<&str>,
) -> Result<DeviceSelection> {
    let Some(requested) = requested else {
        return Ok(DeviceSelection {
            device: resolver.default_output_device()?,
            fallback: None,
        });
    };

    let devices = resolver.output_devices()?;
    if let Some(device) = devices.into_iter().find(|d| matches_name(d, requested)) {
        return Ok(DeviceSelection {
            device,
            fallback: None,
        });
    }

    let device = resolver.default_output_device().map_err(|_| {
        AudioError::DeviceUnavailable(format!(
            "output device '{requested}' not found and no default output is configured"
        ))
    })?;

    let fallback = DeviceFallback {
        requested: requested.to_string(),
        used: device.name.clone(),
    };
    warn!("{}", fallback);

    Ok(DeviceSelection {
        device,
        fallback: Some(fallback),
    })
}
