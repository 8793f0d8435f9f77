//! Integration tests for configuration flowing into the pipeline

use murmur_core::domain::config::{ConfigManager, ConfigWatcher, MurmurConfig};
use murmur_core::domain::control::FilterControl;
use murmur_core::domain::dsp::lowpass_alpha;
use murmur_infra::audio::PipelineSettings;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_config_file_drives_pipeline_settings() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    tokio::fs::write(
        &path,
        r#"
        [audio]
        channels = 1
        chunk_size = 256
        sample_rate = 48000

        [filter]
        cutoff_hz = 2000.0
        enabled = false

        [pipeline]
        ring_capacity_frames = 4096
        startup_timeout_ms = 250
        "#,
    )
    .await
    .unwrap();

    let config = MurmurConfig::load_from_file(&path).await.unwrap();
    let settings = PipelineSettings::from(&config);

    assert_eq!(settings.channels, 1);
    assert_eq!(settings.chunk_size, 256);
    assert_eq!(settings.ring_capacity_samples, 4096);
    assert_eq!(settings.startup_timeout, Duration::from_millis(250));
    assert_eq!(settings.poll_interval, Duration::from_millis(1));

    let control = FilterControl::new(
        config.audio.sample_rate,
        config.filter.cutoff_hz,
        config.filter.enabled,
    );
    assert_eq!(control.alpha(), lowpass_alpha(48000, 2000.0));
    assert!(!control.is_enabled());
}

#[tokio::test]
async fn test_invalid_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    tokio::fs::write(&path, "[audio]\nchunk_size = 0\n")
        .await
        .unwrap();

    assert!(MurmurConfig::load_from_file(&path).await.is_err());
}

#[tokio::test]
async fn test_manager_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(temp_dir.path().join("murmur"));

    let mut config = manager.load().await;
    config.filter.cutoff_hz = 5000.0;
    manager.save(&config).await.unwrap();

    assert_eq!(manager.load().await, config);
}

#[tokio::test]
async fn test_watcher_reports_edits() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    MurmurConfig::default().save_to_file(&path).await.unwrap();

    let watcher = ConfigWatcher::new(path.clone()).await.unwrap();
    let mut changes = watcher.subscribe();

    let mut edited = MurmurConfig::default();
    edited.filter.cutoff_hz = 200.0;
    edited.save_to_file(&path).await.unwrap();

    let changed = tokio::time::timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("no change event within 5s")
        .unwrap();
    assert_eq!(changed, path);

    let reloaded = MurmurConfig::load_from_file(&changed).await.unwrap();
    assert_eq!(reloaded.filter.cutoff_hz, 200.0);
}
