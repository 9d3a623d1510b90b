//! Parking monitor - slot occupancy and illegal parking detection
//!
//! Consumes per-frame vehicle boxes from an object detector and, per sampled
//! frame, reports slot occupancy and vehicles left standing in the aisle.
//!
//! Module structure:
//! - `domain/` - Core types (detections, tracked vehicles, reports)
//! - `io/` - External interfaces (MQTT ingest, JSONL replay, report sinks, Prometheus)
//! - `services/` - Cycle logic (geometry, occupancy, tracker, dwell, monitor loop)
//! - `infra/` - Infrastructure (Config, Regions, Metrics)

use clap::Parser;
use parking_monitor::infra::{Config, InputMode, Metrics, Regions};
use parking_monitor::io::build_sink;
use parking_monitor::services::{
    create_sink_worker, FrameSampler, MonitorLoop, ParkingMonitor, TrackingParams,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Parking monitor - occupancy and illegal parking from detector boxes
#[derive(Parser, Debug)]
#[command(name = "parking-monitor", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Override the slots file from the config
    #[arg(long)]
    slots: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default INFO level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let session = Uuid::now_v7().to_string();

    info!(
        version = %env!("CARGO_PKG_VERSION"),
        git = %env!("GIT_HASH"),
        session = %session,
        "parking-monitor starting"
    );

    let config = Config::load_from_path(&args.config).with_regions(args.slots, None);

    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        input = %config.input_mode().as_str(),
        sample_every = %config.sample_every(),
        match_radius = %config.match_radius(),
        movement_threshold = %config.movement_threshold(),
        illegal_time_limit = %config.illegal_time_limit(),
        sink = %config.sink_mode().as_str(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    // Regions are mandatory: without them nothing can be classified
    let regions = match Regions::load(&config) {
        Ok(regions) => regions,
        Err(e) => {
            error!(error = %format!("{e:#}"), "regions_load_failed");
            return ExitCode::FAILURE;
        }
    };

    match run(config, regions, session).await {
        Ok(()) => {
            info!("parking-monitor shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "parking-monitor failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, regions: Regions, session: String) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    // Report sink worker (off the cycle path)
    let sink = build_sink(&config)?;
    let (report_tx, sink_worker) = create_sink_worker(
        sink,
        Duration::from_millis(config.sink_timeout_ms()),
        metrics.clone(),
        config.sink_queue_capacity(),
    );
    let sink_handle = tokio::spawn(sink_worker.run());

    // Detection ingest (bounded for backpressure)
    let (batch_tx, batch_rx) = mpsc::channel(config.input_channel_capacity());
    match config.input_mode() {
        InputMode::Mqtt => {
            let mqtt_config = config.clone();
            let mqtt_metrics = metrics.clone();
            let mqtt_shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) = parking_monitor::io::mqtt::start_mqtt_client(
                    &mqtt_config,
                    batch_tx,
                    mqtt_metrics,
                    mqtt_shutdown,
                )
                .await
                {
                    error!(error = %e, "mqtt_ingest_failed");
                }
            });
        }
        InputMode::File => {
            let path = config
                .input_file()
                .ok_or_else(|| anyhow::anyhow!("input.mode = \"file\" requires input.file"))?
                .to_string();
            let file_metrics = metrics.clone();
            tokio::spawn(async move {
                if let Err(e) =
                    parking_monitor::io::replay::start_file_source(path, batch_tx, file_metrics)
                        .await
                {
                    error!(error = %e, "file_source_failed");
                }
            });
        }
    }

    // Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_site = config.site_id().to_string();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = parking_monitor::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                prom_site,
                prom_shutdown,
            )
            .await
            {
                error!(error = %e, "prometheus_server_failed");
            }
        });
    }

    // Periodic metrics summary
    let reporter_metrics = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            reporter_metrics.report().log();
        }
    });

    // Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let monitor =
        ParkingMonitor::new(regions, TrackingParams::from_config(&config), metrics.clone());
    let monitor_loop = MonitorLoop::new(
        monitor,
        FrameSampler::new(config.sample_every()),
        config.site_id().to_string(),
        session,
        report_tx,
        metrics.clone(),
    );

    let cycles = monitor_loop.run(batch_rx, shutdown_rx).await;

    // The loop owned the last report sender; let the worker drain
    if tokio::time::timeout(Duration::from_secs(5), sink_handle).await.is_err() {
        tracing::warn!("sink_worker_drain_timeout");
    }

    metrics.report().log();
    info!(cycles = %cycles, "monitor_finished");
    Ok(())
}
