//! Prometheus metrics HTTP endpoint
//!
//! Exposes monitor metrics in Prometheus text format at /metrics and a
//! liveness probe at /health. Uses hyper for the HTTP server.

use crate::infra::metrics::{
    Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS,
};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with site label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    site: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    site: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    avg: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in METRICS_BUCKET_BOUNDS.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let _ = writeln!(output, "{name}_sum{{site=\"{site}\"}} {}", avg * count);
    let _ = writeln!(output, "{name}_count{{site=\"{site}\"}} {count}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, site_id: &str) -> String {
    let summary = metrics.report();
    let mut output = String::with_capacity(4096);

    write_ingest_metrics(&mut output, site_id, &summary);
    write_cycle_metrics(&mut output, site_id, &summary);
    write_lot_metrics(&mut output, site_id, &summary);
    write_sink_metrics(&mut output, site_id, &summary);

    output
}

fn write_ingest_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "parking_frames_received_total",
        "Detection batches received",
        MetricType::Counter,
        site,
        summary.frames_received,
    );
    write_metric(
        output,
        "parking_frames_skipped_total",
        "Detection batches skipped by the frame sampler",
        MetricType::Counter,
        site,
        summary.frames_skipped,
    );
    write_metric(
        output,
        "parking_frames_malformed_total",
        "Detection batches that failed to parse",
        MetricType::Counter,
        site,
        summary.frames_malformed,
    );
    write_metric(
        output,
        "parking_frames_dropped_total",
        "Detection batches dropped due to channel full",
        MetricType::Counter,
        site,
        summary.frames_dropped,
    );
}

fn write_cycle_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "parking_cycles_total",
        "Monitor cycles completed",
        MetricType::Counter,
        site,
        summary.cycles_total,
    );
    let _ = writeln!(output, "# HELP parking_cycles_per_sec Monitor cycles per second");
    let _ = writeln!(output, "# TYPE parking_cycles_per_sec gauge");
    let _ =
        writeln!(output, "parking_cycles_per_sec{{site=\"{site}\"}} {:.2}", summary.cycles_per_sec);

    write_histogram(
        output,
        "parking_cycle_latency_us",
        "Cycle processing latency in microseconds",
        site,
        &summary.lat_buckets,
        summary.avg_cycle_latency_us,
    );
    write_metric(
        output,
        "parking_cycle_latency_p99_us",
        "99th percentile cycle latency",
        MetricType::Gauge,
        site,
        summary.lat_p99_us,
    );
}

fn write_lot_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "parking_detections_total",
        "Detections inside the monitor zone",
        MetricType::Counter,
        site,
        summary.detections_total,
    );
    write_metric(
        output,
        "parking_detections_outside_zone_total",
        "Detections discarded outside the monitor zone",
        MetricType::Counter,
        site,
        summary.detections_outside_zone,
    );
    write_metric(
        output,
        "parking_aisle_detections_total",
        "Detections routed to the aisle tracker",
        MetricType::Counter,
        site,
        summary.aisle_detections_total,
    );
    write_metric(
        output,
        "parking_vehicles_created_total",
        "Aisle vehicles created",
        MetricType::Counter,
        site,
        summary.vehicles_created,
    );
    write_metric(
        output,
        "parking_vehicles_dropped_total",
        "Aisle vehicles dropped",
        MetricType::Counter,
        site,
        summary.vehicles_dropped,
    );
    write_metric(
        output,
        "parking_alerts_total",
        "Illegal parking alerts raised",
        MetricType::Counter,
        site,
        summary.alerts_total,
    );
    write_metric(
        output,
        "parking_occupied_slots",
        "Occupied slots in the latest cycle",
        MetricType::Gauge,
        site,
        summary.occupied_slots,
    );
    write_metric(
        output,
        "parking_tracked_vehicles",
        "Tracked aisle vehicles in the latest cycle",
        MetricType::Gauge,
        site,
        summary.tracked_vehicles,
    );
    write_metric(
        output,
        "parking_illegal_vehicles",
        "Illegally parked vehicles in the latest cycle",
        MetricType::Gauge,
        site,
        summary.illegal_vehicles,
    );
}

fn write_sink_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "parking_reports_delivered_total",
        "Reports delivered by the sink",
        MetricType::Counter,
        site,
        summary.reports_delivered,
    );
    write_metric(
        output,
        "parking_reports_failed_total",
        "Reports the sink failed to deliver",
        MetricType::Counter,
        site,
        summary.reports_failed,
    );
    write_metric(
        output,
        "parking_reports_dropped_total",
        "Reports dropped due to sink queue full",
        MetricType::Counter,
        site,
        summary.reports_dropped,
    );
    write_histogram(
        output,
        "parking_sink_latency_us",
        "Report delivery latency in microseconds",
        site,
        &summary.sink_lat_buckets,
        summary.sink_lat_avg_us,
    );
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    site_id: Arc<String>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, content_type, body) = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => (
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            format_prometheus_metrics(&metrics, &site_id),
        ),
        (&Method::GET, "/health") => (StatusCode::OK, "text/plain", "ok".to_string()),
        _ => (StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string()),
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(hyper::header::CONTENT_TYPE, hyper::header::HeaderValue::from_static(content_type));
    Ok(response)
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    site_id: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let site_id = Arc::new(site_id);

    info!(port = %port, site = %site_id, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let site_id = site_id.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let site_id = site_id.clone();
                                async move { handle_request(req, metrics, site_id).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
