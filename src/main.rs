// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! VitalWatch - real-time heart-rate and temperature telemetry
//!
//! Runs the history store headless: samples come from the live device when
//! connected and from the simulator otherwise. Every sample is logged with
//! its classification, optionally pushed to dashboards over the live feed,
//! and the retained history can be exported on exit.

use anyhow::Result;
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vitalwatch::{
    Config, FeedServer, HistoryExporter, HistoryStore, StoreConfig, StoreEvent, StoreReader,
    WebSocketTransport, VERSION,
};

/// VitalWatch - real-time heart-rate and temperature telemetry
#[derive(Parser, Debug)]
#[command(name = "vitalwatch")]
#[command(version = VERSION)]
#[command(about = "Live vital-sign telemetry with simulated fallback")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device WebSocket endpoint, e.g. ws://192.168.10.5:8080
    #[arg(long)]
    url: Option<String>,

    /// Connect to the device on startup
    #[arg(long)]
    connect: bool,

    /// Serve the live feed on this port
    #[arg(long)]
    feed_port: Option<u16>,

    /// Seed the simulator for a reproducible walk
    #[arg(long)]
    seed: Option<u64>,

    /// Write the retained history to the export directory on exit
    #[arg(long)]
    export_on_exit: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Initialize logging
    let log_level = if args.trace {
        "trace".to_string()
    } else if args.debug {
        "debug".to_string()
    } else {
        config.log_level.clone()
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("VitalWatch v{} - live vital-sign telemetry", VERSION);

    // Override with command line args
    if let Some(url) = args.url {
        config.transport.url = url;
    }
    if args.connect {
        config.transport.auto_connect = true;
    }
    if let Some(port) = args.feed_port {
        config.feed.enabled = true;
        config.feed.port = port;
    }
    if let Some(seed) = args.seed {
        config.simulator.seed = Some(seed);
    }

    info!("Configuration loaded from {:?}", config_path);
    info!("Device endpoint: {}", config.transport.url);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let transport = WebSocketTransport::new(config.transport.url.clone());
        let store = HistoryStore::new(StoreConfig::from(&config), Box::new(transport));
        run(&store, &config, args.export_on_exit, tokio::signal::ctrl_c()).await
    })
}

/// Serve until `stop` resolves. The store is shut down on every path out,
/// errors included.
async fn run<F>(store: &HistoryStore, config: &Config, export_on_exit: bool, stop: F) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let monitor = tokio::spawn(log_events(store.reader()));
    store.start().await;

    let (shutdown_tx, _) = broadcast::channel(1);
    let result = serve(store, config, export_on_exit, &shutdown_tx, stop).await;

    let _ = shutdown_tx.send(());
    store.shutdown().await;
    monitor.abort();

    match &result {
        Ok(()) => info!("VitalWatch shutdown complete"),
        Err(e) => error!("VitalWatch stopped on error: {:#}", e),
    }
    result
}

async fn serve<F>(
    store: &HistoryStore,
    config: &Config,
    export_on_exit: bool,
    shutdown_tx: &broadcast::Sender<()>,
    stop: F,
) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    if config.feed.enabled {
        let feed = FeedServer::new(&config.feed, store.reader());
        feed.start(shutdown_tx.subscribe()).await?;
    }

    if config.transport.auto_connect {
        if let Err(e) = store.connect().await {
            warn!("Device unavailable ({}), continuing with simulated data", e);
        }
    }

    info!("VitalWatch running, press Ctrl+C to shut down");
    stop.await?;

    info!("Shutdown signal received, cleaning up...");

    let stats = store.reader().stats(None);
    info!(
        "Session: {} samples retained, {} alerts, heart rate avg {:.1} bpm, temperature avg {:.1} °C",
        stats.count, stats.alerts, stats.heart_rate.avg, stats.temperature.avg
    );

    if export_on_exit {
        let exporter = HistoryExporter::new(&config.export.path, config.export.format)?;
        exporter.export(&store.history())?;
    }

    Ok(())
}

/// Log every store change; alerts at warn level.
async fn log_events(reader: StoreReader) {
    let mut events = reader.subscribe();

    loop {
        match events.recv().await {
            Ok(StoreEvent::Sample(sample)) => {
                let status = sample.status();
                if sample.is_alert() {
                    warn!(
                        "ALERT heart rate {} bpm ({}), temperature {:.1} °C ({})",
                        sample.heart_rate(),
                        status.heart_rate,
                        sample.temperature(),
                        status.temperature
                    );
                } else {
                    info!(
                        "heart rate {} bpm, temperature {:.1} °C",
                        sample.heart_rate(),
                        sample.temperature()
                    );
                }
            }
            Ok(StoreEvent::Connection(state)) => {
                info!("Data source: {}", state);
            }
            Ok(StoreEvent::Thresholds(thresholds)) => {
                info!("Thresholds changed: {:?}", thresholds);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event log lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
