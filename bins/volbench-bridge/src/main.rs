use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use volbench_api::{create_router, AppState, SystemVolumes};
use volbench_runner::FioLauncher;
use volbench_supervisor::{RegistryConfig, RunRegistry};

mod config;

use config::BridgeConfig;

/// volbench bridge - local disk benchmark supervisor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML). Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// fio binary path (overrides config and discovery)
    #[arg(long, value_name = "PATH")]
    fio_binary: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug)?;

    info!("Starting volbench bridge");

    let mut config = match &args.config {
        Some(path) => {
            info!("Config file: {}", path);
            BridgeConfig::load_from_file(path)?
        }
        None => BridgeConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(fio_binary) = args.fio_binary {
        config.fio_binary = Some(fio_binary);
    }

    let launcher = Arc::new(FioLauncher::new(config.fio_binary.clone()));
    let registry = RunRegistry::start(RegistryConfig {
        store_path: config.store_path(),
        scratch_root: config.scratch_root(),
        launcher,
        volumes: Arc::new(SystemVolumes),
    })
    .await
    .map_err(|e| anyhow::anyhow!("Failed to start run registry: {}", e))?;

    // First reap right after reconciliation, then on an interval. Crashes
    // that never persisted a record can only be cleaned up here.
    spawn_reaper(
        registry.clone(),
        Duration::from_secs(config.reaper_interval_seconds),
    );

    let state = Arc::new(AppState {
        registry: registry.clone(),
        fio_override: config.fio_binary.clone(),
        started: Instant::now(),
    });
    let router = create_router(state);

    volbench_api::serve(router, config.port, shutdown_signal()).await?;

    // A run still active at shutdown must not outlive its supervisor.
    info!("Shutting down, stopping any active run...");
    match registry.stop_all().await {
        Ok(0) => {}
        Ok(stopped) => info!("Stopped {} active run(s)", stopped),
        Err(e) => warn!("Failed to stop active runs during shutdown: {}", e),
    }
    info!("Bridge shut down");

    Ok(())
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    Ok(())
}

/// Periodic orphan reaping, off the request path.
fn spawn_reaper(registry: RunRegistry, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match registry.reap().await {
                Ok(0) => {}
                Ok(count) => info!("Reaped {} orphaned fio process(es)", count),
                Err(e) => {
                    warn!("Orphan reap failed, registry unavailable: {}", e);
                    break;
                }
            }
        }
    });
}

async fn shutdown_signal() {
    use tokio::signal;

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("Failed to create SIGTERM handler");
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("Failed to create SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM signal");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT signal");
        }
    }
}
