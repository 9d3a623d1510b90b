//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics on the cycle path so ingest, the monitor loop and the sink
//! worker never contend on a mutex. Reporting is the only operation that
//! resets anything (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering. These are statistical counters
//! only and must not drive logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Last bucket uses 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Detection batches received from ingest (monotonic)
    frames_received: AtomicU64,
    /// Batches skipped by the frame sampler (monotonic)
    frames_skipped: AtomicU64,
    /// Batches that failed to parse (monotonic)
    frames_malformed: AtomicU64,
    /// Batches dropped because the cycle channel was full (monotonic)
    frames_dropped: AtomicU64,
    /// Cycles completed (monotonic)
    cycles_total: AtomicU64,
    /// Cycles since last report (reset on report)
    cycles_since_report: AtomicU64,
    /// Sum of cycle latencies in microseconds (reset on report)
    cycle_latency_sum_us: AtomicU64,
    /// Max cycle latency in microseconds (reset on report)
    cycle_latency_max_us: AtomicU64,
    /// Cycle latency histogram buckets (reset on report)
    cycle_latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Detections seen inside the monitor zone (monotonic)
    detections_total: AtomicU64,
    /// Detections discarded outside the monitor zone (monotonic)
    detections_outside_zone: AtomicU64,
    /// Detections routed to the aisle tracker (monotonic)
    aisle_detections_total: AtomicU64,
    /// Vehicles created (monotonic)
    vehicles_created: AtomicU64,
    /// Vehicles dropped (monotonic)
    vehicles_dropped: AtomicU64,
    /// Illegal parking alerts raised (monotonic)
    alerts_total: AtomicU64,
    /// Occupied slots in the latest cycle (gauge)
    occupied_slots: AtomicU64,
    /// Tracked aisle vehicles in the latest cycle (gauge)
    tracked_vehicles: AtomicU64,
    /// Illegally parked vehicles in the latest cycle (gauge)
    illegal_vehicles: AtomicU64,
    /// Reports delivered by the sink (monotonic)
    reports_delivered: AtomicU64,
    /// Reports the sink failed to deliver (monotonic)
    reports_failed: AtomicU64,
    /// Reports dropped because the sink queue was full (monotonic)
    reports_dropped: AtomicU64,
    /// Sink delivery latency histogram (reset on report)
    sink_latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of sink delivery latencies (reset on report)
    sink_latency_sum_us: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            frames_malformed: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            cycles_total: AtomicU64::new(0),
            cycles_since_report: AtomicU64::new(0),
            cycle_latency_sum_us: AtomicU64::new(0),
            cycle_latency_max_us: AtomicU64::new(0),
            cycle_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            detections_total: AtomicU64::new(0),
            detections_outside_zone: AtomicU64::new(0),
            aisle_detections_total: AtomicU64::new(0),
            vehicles_created: AtomicU64::new(0),
            vehicles_dropped: AtomicU64::new(0),
            alerts_total: AtomicU64::new(0),
            occupied_slots: AtomicU64::new(0),
            tracked_vehicles: AtomicU64::new(0),
            illegal_vehicles: AtomicU64::new(0),
            reports_delivered: AtomicU64::new(0),
            reports_failed: AtomicU64::new(0),
            reports_dropped: AtomicU64::new(0),
            sink_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sink_latency_sum_us: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_malformed(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch dropped due to channel full (lock-free)
    #[inline]
    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed cycle and its processing latency (lock-free)
    #[inline]
    pub fn record_cycle(&self, latency_us: u64) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        self.cycles_since_report.fetch_add(1, Ordering::Relaxed);
        self.cycle_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.cycle_latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.cycle_latency_max_us, latency_us);
    }

    /// Record how one cycle's detections were routed
    #[inline]
    pub fn record_detections(&self, in_zone: usize, outside_zone: usize, aisle: usize) {
        self.detections_total.fetch_add(in_zone as u64, Ordering::Relaxed);
        self.detections_outside_zone.fetch_add(outside_zone as u64, Ordering::Relaxed);
        self.aisle_detections_total.fetch_add(aisle as u64, Ordering::Relaxed);
    }

    /// Record vehicle churn from one tracker update
    #[inline]
    pub fn record_vehicle_churn(&self, created: usize, dropped: usize) {
        self.vehicles_created.fetch_add(created as u64, Ordering::Relaxed);
        self.vehicles_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alerts(&self, count: usize) {
        self.alerts_total.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Set the per-cycle gauges
    #[inline]
    pub fn set_cycle_gauges(&self, occupied: usize, tracked: usize, illegal: usize) {
        self.occupied_slots.store(occupied as u64, Ordering::Relaxed);
        self.tracked_vehicles.store(tracked as u64, Ordering::Relaxed);
        self.illegal_vehicles.store(illegal as u64, Ordering::Relaxed);
    }

    /// Record a delivered report and its delivery latency
    #[inline]
    pub fn record_report_delivered(&self, latency_us: u64) {
        self.reports_delivered.fetch_add(1, Ordering::Relaxed);
        self.sink_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.sink_latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_report_failed(&self) {
        self.reports_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a report dropped due to sink queue full (lock-free)
    #[inline]
    pub fn record_report_dropped(&self) {
        self.reports_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn frames_malformed(&self) -> u64 {
        self.frames_malformed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn detections_total(&self) -> u64 {
        self.detections_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn detections_outside_zone(&self) -> u64 {
        self.detections_outside_zone.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn aisle_detections_total(&self) -> u64 {
        self.aisle_detections_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn vehicles_created(&self) -> u64 {
        self.vehicles_created.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn vehicles_dropped(&self) -> u64 {
        self.vehicles_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn alerts_total(&self) -> u64 {
        self.alerts_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn occupied_slots(&self) -> u64 {
        self.occupied_slots.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn tracked_vehicles(&self) -> u64 {
        self.tracked_vehicles.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn illegal_vehicles(&self) -> u64 {
        self.illegal_vehicles.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reports_delivered(&self) -> u64 {
        self.reports_delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reports_failed(&self) -> u64 {
        self.reports_failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reports_dropped(&self) -> u64 {
        self.reports_dropped.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    pub fn report(&self) -> MetricsSummary {
        let cycles_count = self.cycles_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.cycle_latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.cycle_latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.cycle_latency_buckets);

        let sink_buckets = swap_buckets(&self.sink_latency_buckets);
        let sink_sum = self.sink_latency_sum_us.swap(0, Ordering::Relaxed);
        let sink_count: u64 = sink_buckets.iter().sum();

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let cycles_per_sec = if elapsed.as_secs_f64() > 0.0 {
            cycles_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        MetricsSummary {
            frames_received: self.frames_received(),
            frames_skipped: self.frames_skipped(),
            frames_malformed: self.frames_malformed(),
            frames_dropped: self.frames_dropped(),
            cycles_total: self.cycles_total(),
            cycles_per_sec,
            avg_cycle_latency_us: if cycles_count > 0 { latency_sum / cycles_count } else { 0 },
            max_cycle_latency_us: max_latency,
            lat_buckets,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p95_us: percentile_from_buckets(&lat_buckets, 0.95),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            detections_total: self.detections_total(),
            detections_outside_zone: self.detections_outside_zone(),
            aisle_detections_total: self.aisle_detections_total(),
            vehicles_created: self.vehicles_created(),
            vehicles_dropped: self.vehicles_dropped(),
            alerts_total: self.alerts_total(),
            occupied_slots: self.occupied_slots(),
            tracked_vehicles: self.tracked_vehicles(),
            illegal_vehicles: self.illegal_vehicles(),
            reports_delivered: self.reports_delivered(),
            reports_failed: self.reports_failed(),
            reports_dropped: self.reports_dropped(),
            sink_lat_buckets: sink_buckets,
            sink_lat_avg_us: if sink_count > 0 { sink_sum / sink_count } else { 0 },
            sink_lat_p99_us: percentile_from_buckets(&sink_buckets, 0.99),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for prometheus)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug)]
pub struct MetricsSummary {
    pub frames_received: u64,
    pub frames_skipped: u64,
    pub frames_malformed: u64,
    pub frames_dropped: u64,
    pub cycles_total: u64,
    pub cycles_per_sec: f64,
    pub avg_cycle_latency_us: u64,
    pub max_cycle_latency_us: u64,
    /// Cycle latency histogram buckets
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p95_us: u64,
    pub lat_p99_us: u64,
    pub detections_total: u64,
    pub detections_outside_zone: u64,
    pub aisle_detections_total: u64,
    pub vehicles_created: u64,
    pub vehicles_dropped: u64,
    pub alerts_total: u64,
    pub occupied_slots: u64,
    pub tracked_vehicles: u64,
    pub illegal_vehicles: u64,
    pub reports_delivered: u64,
    pub reports_failed: u64,
    pub reports_dropped: u64,
    /// Sink delivery latency histogram buckets (same bounds)
    pub sink_lat_buckets: [u64; NUM_BUCKETS],
    pub sink_lat_avg_us: u64,
    pub sink_lat_p99_us: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            frames = %self.frames_received,
            skipped = %self.frames_skipped,
            cycles_total = %self.cycles_total,
            cycles_per_sec = format!("{:.1}", self.cycles_per_sec),
            avg_latency_us = %self.avg_cycle_latency_us,
            p99_us = %self.lat_p99_us,
            occupied = %self.occupied_slots,
            tracked = %self.tracked_vehicles,
            illegal = %self.illegal_vehicles,
            alerts = %self.alerts_total,
            delivered = %self.reports_delivered,
            failed = %self.reports_failed,
            dropped = %(self.frames_dropped + self.reports_dropped),
            "metrics"
        );
    }
}
