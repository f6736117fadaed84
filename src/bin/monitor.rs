//! Sound Monitor Application
//!
//! Samples the microphone (or synthetic noise), logs threshold crossings and
//! serves snapshots to presentation layers over HTTP/WebSocket.
//!
//! Usage: `sound-monitor [--synthetic] [--allow-mic] [--config <path>] [--no-web]`

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sound_level_monitor::{
    audio::{list_input_devices, SourceKind},
    config::AppConfig,
    ui::WebServer,
    SoundLevelMonitor,
};

/// Command line overrides
#[derive(Debug, Default)]
struct Args {
    config_path: Option<PathBuf>,
    synthetic: bool,
    allow_mic: bool,
    no_web: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--synthetic" => args.synthetic = true,
            "--allow-mic" => args.allow_mic = true,
            "--no-web" => args.no_web = true,
            "--config" => {
                let path = iter.next().context("--config requires a path")?;
                args.config_path = Some(PathBuf::from(path));
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }

    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sound Level Monitor");

    let args = parse_args()?;

    // Load or create config
    let mut config = match &args.config_path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load_or_default()?,
    };
    if args.synthetic {
        config.monitor.source = SourceKind::Synthetic;
    }
    if args.allow_mic {
        config.monitor.permission_granted = true;
    }
    if args.no_web {
        config.ui.enabled = false;
    }

    if config.monitor.source == SourceKind::Device {
        println!("\n=== Available Input Devices ===");
        for device in list_input_devices() {
            let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
            println!("  {}{}", device.name, default_marker);
            if let (Some(rate), Some(channels)) = (device.sample_rate, device.channels) {
                println!("    {} Hz, {} channels", rate, channels);
            }
        }
        println!();
    }

    let monitor = Arc::new(SoundLevelMonitor::from_config(&config.monitor));

    if config.ui.enabled {
        let web_server = WebServer::new(config.ui.clone(), monitor.clone());
        let _web_handle = web_server.start_background();
        tracing::info!(
            "Observer bridge at http://{}:{}",
            config.ui.bind_address,
            config.ui.http_port
        );
    }

    if monitor.permission_granted() {
        let monitor = monitor.clone();
        tokio::task::spawn_blocking(move || monitor.start())
            .await?
            .context("Failed to start monitor")?;
    } else {
        tracing::warn!(
            "Microphone permission not granted; pass --allow-mic, set monitor.permission_granted \
             or grant it through POST /api/permission"
        );
    }

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    tracing::info!("Monitoring - press Ctrl+C to stop");

    let mut last_stats_time = Instant::now();
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Periodic stats logging
        if last_stats_time.elapsed() >= Duration::from_secs(5) {
            last_stats_time = Instant::now();

            let snapshot = monitor.snapshot();
            if snapshot.running {
                tracing::info!(
                    "Level {:.1} dB{} ({} ticks, {} sample errors)",
                    snapshot.reading.decibel_level,
                    if snapshot.reading.threshold_exceeded { " [LOUD]" } else { "" },
                    snapshot.tick,
                    snapshot.sample_errors,
                );
            } else {
                tracing::info!("Monitor idle: {}", snapshot.diagnostic);
            }
        }
    }

    tracing::info!("Shutting down");
    let monitor_for_stop = monitor.clone();
    tokio::task::spawn_blocking(move || monitor_for_stop.stop()).await?;

    Ok(())
}

/// Ctrl+C handler
fn ctrlc_handler(running: Arc<AtomicBool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        tokio::spawn(async move {
            match signal(SignalKind::interrupt()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install signal handler: {}", e);
                    return;
                }
            }
            running.store(false, Ordering::SeqCst);
        });
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        }) {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
        }
    }
}
