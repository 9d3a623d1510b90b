//! Offline replay - run a detections JSONL file through the monitor
//!
//! Writes one cycle report per sampled line, as JSON, to stdout or `--output`.
//! Logs go to stderr so stdout stays machine-readable.
//!
//! Usage: parking-replay --slots slots.json --zone zone.json detections.jsonl

use anyhow::Context;
use clap::Parser;
use parking_monitor::infra::{Config, Metrics, Regions};
use parking_monitor::io::replay::DetectionReader;
use parking_monitor::services::{FrameSampler, ParkingMonitor, TrackingParams};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parking-replay", version, about = "Replay detector output through the parking monitor")]
struct Args {
    /// Detections file (one `{"frame": n, "boxes": [...]}` object per line)
    input: String,

    /// Path to TOML configuration file (regions and tracking parameters)
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Override the slots file from the config
    #[arg(long)]
    slots: Option<String>,

    /// Monitor zone JSON file (`[[x, y], ...]`), overrides the config
    #[arg(long)]
    zone: Option<String>,

    /// Run a cycle on every Nth line (defaults to the config value)
    #[arg(long)]
    sample_every: Option<u64>,

    /// Write reports here instead of stdout
    #[arg(short, long)]
    output: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let zone = match args.zone.as_deref() {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read monitor zone file {path}"))?;
            let points: Vec<[i32; 2]> = serde_json::from_str(&content)
                .with_context(|| format!("Monitor zone file {path} must be a list of [x, y] points"))?;
            Some(points)
        }
        None => None,
    };

    let config = Config::load_from_path(&args.config).with_regions(args.slots, zone);
    let regions = Regions::load(&config)?;

    let metrics = Arc::new(Metrics::new());
    let mut monitor =
        ParkingMonitor::new(regions, TrackingParams::from_config(&config), metrics.clone());
    let mut sampler = FrameSampler::new(args.sample_every.unwrap_or(config.sample_every()));

    let mut out: Box<dyn Write> = match args.output.as_deref() {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file {path}"))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut reader = DetectionReader::open(&args.input)?;
    for batch in reader.by_ref() {
        if !sampler.admit() {
            continue;
        }
        let outcome = monitor.run_cycle(&batch.detections());
        writeln!(out, "{}", outcome.report.to_json())?;
    }
    out.flush()?;

    info!(
        frames = %sampler.seen(),
        cycles = %monitor.cycles(),
        skipped_lines = %reader.skipped(),
        alerts = %metrics.alerts_total(),
        "replay_finished"
    );
    Ok(())
}
