//! CPAL-based device resolution
//!
//! Enumerates the host's devices into [`DeviceInfo`] records for the
//! name-matching logic in the core crate, and looks devices back up by
//! their exact name when a stream is opened.

use cpal::traits::{DeviceTrait, HostTrait};
use murmur_core::domain::audio::{
    AudioError, ChannelCount, DeviceId, DeviceInfo, DeviceResolver, DeviceType, Result, SampleRate,
};
use tracing::{debug, info, warn};

#[allow(deprecated)]
pub(crate) fn device_name(device: &cpal::Device) -> String {
    device
        .name()
        .unwrap_or_else(|_| "Unknown Device".to_string())
}

fn input_channel_counts(device: &cpal::Device) -> Vec<u16> {
    device
        .supported_input_configs()
        .map(|configs| configs.map(|c| c.channels()).collect())
        .unwrap_or_default()
}

fn output_channel_counts(device: &cpal::Device) -> Vec<u16> {
    device
        .supported_output_configs()
        .map(|configs| configs.map(|c| c.channels()).collect())
        .unwrap_or_default()
}

/// Channel counts the device can capture with
pub(crate) fn supported_input_channels(device: &cpal::Device) -> Vec<u16> {
    let mut counts = input_channel_counts(device);
    counts.sort_unstable();
    counts.dedup();
    counts
}

fn describe(device: &cpal::Device, device_type: DeviceType) -> DeviceInfo {
    let name = device_name(device);

    let mut counts = match device_type {
        DeviceType::Input => input_channel_counts(device),
        DeviceType::Output => output_channel_counts(device),
        DeviceType::Duplex => {
            let mut counts = input_channel_counts(device);
            counts.extend(output_channel_counts(device));
            counts
        }
    };
    counts.sort_unstable();
    counts.dedup();

    let default_config = match device_type {
        DeviceType::Output => device.default_output_config(),
        _ => device
            .default_input_config()
            .or_else(|_| device.default_output_config()),
    };
    let default_sample_rate = default_config
        .ok()
        .map(|config| SampleRate::from_hz(config.sample_rate()));

    DeviceInfo {
        id: DeviceId::new(name.clone()),
        name,
        device_type,
        channel_counts: counts.into_iter().map(ChannelCount::from_count).collect(),
        default_sample_rate,
    }
}

/// CPAL-based device resolver
pub struct CpalDeviceResolver {
    host: cpal::Host,
}

impl Default for CpalDeviceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalDeviceResolver {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host: {:?}", host.id());
        Self { host }
    }

    pub fn host(&self) -> &cpal::Host {
        &self.host
    }

    fn device_type(device: &cpal::Device) -> Option<DeviceType> {
        let has_input = !input_channel_counts(device).is_empty();
        let has_output = !output_channel_counts(device).is_empty();

        match (has_input, has_output) {
            (true, true) => Some(DeviceType::Duplex),
            (true, false) => Some(DeviceType::Input),
            (false, true) => Some(DeviceType::Output),
            (false, false) => None,
        }
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let cpal_devices = self
            .host
            .devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?;

        let devices: Vec<DeviceInfo> = cpal_devices
            .filter_map(|device| match Self::device_type(&device) {
                Some(device_type) => Some(describe(&device, device_type)),
                None => {
                    warn!("Skipping device without inputs or outputs: {}", device_name(&device));
                    None
                }
            })
            .collect();

        info!("Found {} audio devices", devices.len());
        Ok(devices)
    }

    /// Open the input device with exactly this name
    pub fn input_device(&self, name: &str) -> Result<cpal::Device> {
        self.host
            .input_devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?
            .find(|d| device_name(d) == name)
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
    }

    /// Open the output device with exactly this name
    pub fn output_device(&self, name: &str) -> Result<cpal::Device> {
        self.host
            .output_devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?
            .find(|d| device_name(d) == name)
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
    }
}

impl DeviceResolver for CpalDeviceResolver {
    fn input_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self
            .devices()?
            .into_iter()
            .filter(|d| matches!(d.device_type, DeviceType::Input | DeviceType::Duplex))
            .collect())
    }

    fn output_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self
            .devices()?
            .into_iter()
            .filter(|d| matches!(d.device_type, DeviceType::Output | DeviceType::Duplex))
            .collect())
    }

    fn default_output_device(&self) -> Result<DeviceInfo> {
        let device = self
            .host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()))?;

        Ok(describe(&device, DeviceType::Output))
    }
}
