//! Example demonstrating configuration round-trips and the filter it drives
//!
//! Run with: cargo run --package murmur-core --example config_demo

use murmur_core::domain::config::MurmurConfig;
use murmur_core::domain::control::{CutoffPreset, FilterControl};
use murmur_core::domain::dsp::FilterEngine;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("murmur_core=debug,info")
        .init();

    println!("=== Murmur Configuration Demo ===\n");

    println!("1. Saving default configuration...");
    let dir = std::env::temp_dir().join("murmur-config-demo");
    let config_path = dir.join("config.toml");
    let mut config = MurmurConfig::default();
    config.filter.cutoff_hz = 500.0;
    config.save_to_file(&config_path).await?;
    println!("   Saved to {}", config_path.display());

    println!("\n2. Loading it back...");
    let loaded = MurmurConfig::load_from_file(&config_path).await?;
    println!(
        "   input '{}', {} ch @ {} Hz, chunk {} frames, cutoff {:.1} Hz",
        loaded.audio.input_device,
        loaded.audio.channels,
        loaded.audio.sample_rate,
        loaded.audio.chunk_size,
        loaded.filter.cutoff_hz
    );

    println!("\n3. Step response at each preset (mono, 8 samples):");
    let control = Arc::new(FilterControl::new(
        loaded.audio.sample_rate,
        loaded.filter.cutoff_hz,
        loaded.filter.enabled,
    ));
    let step = [1.0f32; 8];
    let mut output = [0.0f32; 8];

    for preset in [CutoffPreset::Low, CutoffPreset::Mid, CutoffPreset::High] {
        control.apply_preset(preset);
        let mut filter = FilterEngine::new(1, Arc::clone(&control));
        filter.process(&step, &mut output)?;

        let rendered: Vec<String> = output.iter().map(|y| format!("{:.3}", y)).collect();
        println!(
            "   {:>6.0} Hz (alpha {:.4}): {}",
            control.cutoff(),
            control.alpha(),
            rendered.join(" ")
        );
    }

    tokio::fs::remove_dir_all(&dir).await?;
    println!("\n=== Demo Complete ===");
    Ok(())
}
