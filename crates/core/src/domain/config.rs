//! Configuration management for Murmur
//!
//! This module provides:
//! - The TOML-backed [`MurmurConfig`] with audio, filter and pipeline sections
//! - A [`ConfigManager`] owning `<config dir>/murmur/config.toml`
//! - A [`ConfigWatcher`] for hot-reloading filter settings

use crate::domain::dsp::params;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Device and stream format settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSection {
    /// Case-insensitive substring of the capture device name
    pub input_device: String,

    /// Playback device name (None = system default output)
    pub output_device: Option<String>,

    /// Sample rate in Hz, shared by capture and playback
    pub sample_rate: u32,

    /// Channels the pipeline runs at
    pub channels: u16,

    /// Frames processed per chunk
    pub chunk_size: usize,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            input_device: "BlackHole 16ch".to_string(),
            output_device: None,
            sample_rate: 44100,
            channels: 2,
            chunk_size: 1024,
        }
    }
}

/// Low-pass filter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    pub cutoff_hz: f32,
    pub enabled: bool,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            cutoff_hz: params::CUTOFF_DEFAULT,
            enabled: true,
        }
    }
}

/// Buffering and scheduling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Ring buffer size in frames (multiplied by the channel count)
    pub ring_capacity_frames: usize,

    /// Length of the capture device's looping buffer in seconds
    pub capture_buffer_secs: u32,

    /// How long to wait for the capture device to report a position
    pub startup_timeout_ms: u64,

    /// Sleep between drain iterations
    pub poll_interval_ms: u64,

    /// Buffer status log interval (0 = disabled)
    pub status_interval_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            ring_capacity_frames: 16384,
            capture_buffer_secs: 1,
            startup_timeout_ms: 1000,
            poll_interval_ms: 1,
            status_interval_secs: 5,
        }
    }
}

impl PipelineSection {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Complete Murmur configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MurmurConfig {
    pub audio: AudioSection,
    pub filter: FilterSection,
    pub pipeline: PipelineSection,
}

impl MurmurConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if self.audio.channels == 0 {
            return Err(ConfigError::Invalid("channels must be positive".to_string()));
        }
        if self.audio.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".to_string()));
        }
        if self.pipeline.ring_capacity_frames < self.audio.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "ring_capacity_frames ({}) must hold at least one chunk ({})",
                self.pipeline.ring_capacity_frames, self.audio.chunk_size
            )));
        }
        if self.pipeline.capture_buffer_secs == 0 {
            return Err(ConfigError::Invalid(
                "capture_buffer_secs must be positive".to_string(),
            ));
        }
        if !self.filter.cutoff_hz.is_finite() {
            return Err(ConfigError::Invalid("cutoff_hz must be finite".to_string()));
        }
        Ok(())
    }

    /// Ring buffer capacity in interleaved samples
    pub fn ring_capacity_samples(&self) -> usize {
        self.pipeline.ring_capacity_frames * usize::from(self.audio.channels)
    }
}

/// File system watcher for hot-reload of the main config file
pub struct ConfigWatcher {
    _watcher: notify::RecommendedWatcher,
    config_tx: broadcast::Sender<PathBuf>,
}

impl ConfigWatcher {
    /// Watch `config_path` and broadcast its path whenever it is written
    pub async fn new(config_path: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let (config_tx, _config_rx) = broadcast::channel(32);

        let watch_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ConfigError::Invalid("config path has no parent".to_string()))?;
        fs::create_dir_all(&watch_dir).await?;

        let tx_clone = config_tx.clone();
        let target = config_path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) && event.paths.iter().any(|p| p.file_name() == target.file_name())
                {
                    // No subscribers is fine, nobody is listening yet
                    let _ = tx_clone.send(target.clone());
                }
            }
        })?;

        watcher.watch(&watch_dir, notify::RecursiveMode::NonRecursive)?;

        info!(path = %config_path.display(), "Config watcher started");

        Ok(Self {
            _watcher: watcher,
            config_tx,
        })
    }

    /// Subscribe to config change events
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.config_tx.subscribe()
    }
}

/// Configuration manager for the main Murmur config
///
/// Manages the configuration file at `~/.config/murmur/config.toml`.
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/murmur` on Linux, the platform equivalent elsewhere
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("murmur"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// If the config file doesn't exist, writes and returns the defaults.
    /// If the config file is corrupt, backs it up and returns the defaults.
    #[instrument(skip(self))]
    pub async fn load(&self) -> MurmurConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating default"
            );

            let config = MurmurConfig::default();
            if let Err(e) = self.save(&config).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save default config"
                );
            }

            return config;
        }

        match MurmurConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                MurmurConfig::default()
            }
        }
    }

    /// Save configuration to file
    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &MurmurConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
