//! Murmur CLI Application

mod commands;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use commands::Command;
use murmur_core::domain::audio::{CaptureSource, DeviceInfo, DeviceResolver};
use murmur_core::domain::config::{ConfigManager, ConfigWatcher, MurmurConfig};
use murmur_core::domain::control::FilterControl;
use murmur_infra::audio::{CpalDeviceResolver, NoiseSender, PassthroughEngine, Pipeline};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Real-time low-pass filtering audio passthrough", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the per-user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture, filter and play back (the default)
    Run(RunArgs),
    /// List audio devices
    Devices,
    /// Stream white noise to an output device
    Noise {
        /// Output device name (substring match)
        #[arg(short, long, default_value = "BlackHole 16ch")]
        device: String,

        /// Peak amplitude, 0.0 to 1.0
        #[arg(short, long, default_value_t = 1.0)]
        amplitude: f32,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Input device name (substring match)
    #[arg(short, long)]
    input_device: Option<String>,

    /// Output device name (substring match, default system output otherwise)
    #[arg(short, long)]
    output_device: Option<String>,

    /// Low-pass cutoff frequency in Hz
    #[arg(short, long)]
    cutoff: Option<f32>,

    /// Start with the filter bypassed
    #[arg(long)]
    no_filter: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut MurmurConfig) {
        if let Some(input) = &self.input_device {
            config.audio.input_device = input.clone();
        }
        if let Some(output) = &self.output_device {
            config.audio.output_device = Some(output.clone());
        }
        if let Some(cutoff) = self.cutoff {
            config.filter.cutoff_hz = cutoff;
        }
        if self.no_filter {
            config.filter.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(args, cli.config).await,
        Commands::Devices => list_devices(),
        Commands::Noise { device, amplitude } => {
            let (config, _) = load_config(cli.config).await?;
            send_noise(&device, amplitude, &config).await
        }
    }
}

/// Load the explicit config file, or the per-user one (created on first run)
async fn load_config(path: Option<PathBuf>) -> anyhow::Result<(MurmurConfig, PathBuf)> {
    match path {
        Some(path) => {
            let config = MurmurConfig::load_from_file(&path)
                .await
                .with_context(|| format!("failed to load {}", path.display()))?;
            Ok((config, path))
        }
        None => {
            let manager = ConfigManager::new(ConfigManager::default_config_dir()?);
            let config = manager.load().await;
            Ok((config, manager.config_path().to_path_buf()))
        }
    }
}

async fn run(args: RunArgs, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (mut on_disk, config_path) = load_config(config_path).await?;
    let mut config = on_disk.clone();
    args.apply(&mut config);
    config.validate()?;

    let mut engine = PassthroughEngine::start(&config).context("failed to start passthrough")?;

    let report = engine.report();
    for fallback in report.fallbacks() {
        println!("warning: {}", fallback);
    }
    info!(
        "Capturing from '{}' and playing with low-pass filter (cutoff: {:.1} Hz)",
        report.input.device.name,
        engine.pipeline().control().cutoff()
    );
    println!("{}", commands::HELP);

    let control = Arc::clone(engine.pipeline().control());

    // Hot reload is best effort; the passthrough runs without it
    let watcher = match ConfigWatcher::new(config_path.clone()).await {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "Config hot reload disabled");
            None
        }
    };
    let mut config_changes = watcher.as_ref().map(ConfigWatcher::subscribe);

    let mut status_ticks = match config.pipeline.status_interval_secs {
        0 => None,
        secs => {
            let period = Duration::from_secs(secs);
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(interval)
        }
    };

    let mut console = spawn_console_reader();
    let mut console_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("failed to listen for Ctrl-C")?;
                info!("Interrupted by user");
                break;
            }
            line = console.recv(), if console_open => match line {
                Some(line) => match commands::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => execute(command, engine.pipeline()),
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                },
                None => {
                    info!("Console closed, press Ctrl-C to stop");
                    console_open = false;
                }
            },
            _ = next_tick(&mut status_ticks) => {
                info!("{}", engine.pipeline().status());
            }
            _ = next_change(&mut config_changes) => {
                apply_config_change(&config_path, &control, &mut on_disk).await;
            }
        }
    }

    info!("Stopping continuous audio processing...");
    engine.stop();
    Ok(())
}

/// Read console lines on a detached thread.
///
/// tokio's stdin would keep the runtime from shutting down until the next
/// line arrives.
fn spawn_console_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    let spawned = std::thread::Builder::new()
        .name("murmur-console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

    // On failure the sender is dropped and the console reads as closed
    if let Err(e) = spawned {
        warn!(error = %e, "Console input unavailable");
    }
    rx
}

fn execute<S: CaptureSource + 'static>(command: Command, pipeline: &Pipeline<S>) {
    match command {
        Command::Cutoff(hz) => {
            pipeline.set_cutoff_frequency(hz);
        }
        Command::Preset(preset) => {
            pipeline.apply_preset(preset);
        }
        Command::Toggle => {
            let enabled = pipeline.toggle_filter();
            println!("Filter {}", if enabled { "enabled" } else { "disabled" });
        }
        Command::Status => println!("{}", pipeline.status()),
        Command::Help => println!("{}", commands::HELP),
        Command::Quit => {}
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_change(changes: &mut Option<broadcast::Receiver<PathBuf>>) {
    let Some(rx) = changes else {
        return std::future::pending().await;
    };

    match rx.recv().await {
        // A lagged receiver still means the file changed
        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
        Err(broadcast::error::RecvError::Closed) => {
            *changes = None;
            std::future::pending::<()>().await;
        }
    }
}

/// Apply filter edits from the config file to the running pipeline.
///
/// Only fields that differ from the previously loaded file are applied, so
/// command-line and console overrides survive unrelated edits. Device and
/// buffer settings only take effect on restart.
async fn apply_config_change(path: &Path, control: &FilterControl, on_disk: &mut MurmurConfig) {
    let updated = match MurmurConfig::load_from_file(path).await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Ignoring invalid config change");
            return;
        }
    };

    let changed = apply_filter_settings(on_disk, &updated, control);
    if updated.audio != on_disk.audio || updated.pipeline != on_disk.pipeline {
        info!("Audio and pipeline settings changed, restart to apply them");
    } else if !changed {
        debug!("Config reloaded, nothing to apply");
    }

    *on_disk = updated;
}

/// Push the filter fields edited between `previous` and `updated`.
/// Returns whether anything was applied.
fn apply_filter_settings(
    previous: &MurmurConfig,
    updated: &MurmurConfig,
    control: &FilterControl,
) -> bool {
    let mut changed = false;

    if updated.filter.cutoff_hz != previous.filter.cutoff_hz {
        control.set_cutoff(updated.filter.cutoff_hz);
        changed = true;
    }
    if updated.filter.enabled != previous.filter.enabled {
        control.set_enabled(updated.filter.enabled);
        info!(enabled = updated.filter.enabled, "Filter enable flag reloaded");
        changed = true;
    }

    changed
}

fn list_devices() -> anyhow::Result<()> {
    let resolver = CpalDeviceResolver::new();

    println!("Input devices:");
    for device in resolver.input_devices()? {
        println!("  {}", describe(&device));
    }

    println!("Output devices:");
    for device in resolver.output_devices()? {
        println!("  {}", describe(&device));
    }

    match resolver.default_output_device() {
        Ok(device) => println!("Default output: {}", device.name),
        Err(e) => println!("Default output: none ({})", e),
    }
    Ok(())
}

fn describe(device: &DeviceInfo) -> String {
    let channels: Vec<String> = device
        .channel_counts
        .iter()
        .map(|c| c.count().to_string())
        .collect();
    match device.default_sample_rate {
        Some(rate) => format!("{} [{} ch, {} Hz]", device.name, channels.join("/"), rate.hz()),
        None => format!("{} [{} ch]", device.name, channels.join("/")),
    }
}

async fn send_noise(device: &str, amplitude: f32, config: &MurmurConfig) -> anyhow::Result<()> {
    let sender = NoiseSender::start(
        device,
        config.audio.channels,
        config.audio.sample_rate,
        amplitude,
    )
    .context("failed to start noise sender")?;

    if let Some(fallback) = &sender.selection().fallback {
        println!("warning: {}", fallback);
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Interrupted by user");
    drop(sender);
    Ok(())
}
