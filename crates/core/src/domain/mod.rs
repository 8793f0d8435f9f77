//! Domain entities and business rules

pub mod audio;
pub mod config;
pub mod control;
pub mod dsp;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{
    resolve_input_device, resolve_output_device, AudioError, CaptureSource, ChannelCount,
    ChannelLayout, DeviceFallback, DeviceId, DeviceInfo, DeviceResolver, DeviceSelection,
    DeviceType, SampleRate,
};
pub use config::{
    AudioSection, ConfigError, ConfigManager, ConfigWatcher, FilterSection, MurmurConfig,
    PipelineSection,
};
pub use control::{CutoffPreset, FilterControl};
pub use dsp::{params, FilterEngine};
