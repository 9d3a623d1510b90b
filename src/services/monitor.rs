//! Parking monitor - one cycle per sampled detection batch
//!
//! A cycle runs, in order:
//! 1. Monitor zone filter and slot classification
//! 2. Aisle tracking (association, dwell, drop)
//! 3. Illegal parking scan (one-time alerts)
//! 4. Report assembly
//!
//! [`ParkingMonitor`] is synchronous and owns all cross-cycle state.
//! [`MonitorLoop`] feeds it from the ingest channel and hands reports to the
//! sink worker.

use crate::domain::report::{CycleReport, IllegalParkingAlert, ReportEnvelope};
use crate::domain::types::{Detection, DetectionBatch};
use crate::infra::metrics::Metrics;
use crate::infra::regions::Regions;
use crate::services::dwell::IllegalParkingDetector;
use crate::services::occupancy::classify;
use crate::services::report_builder::build_report;
use crate::services::sink_worker::ReportSender;
use crate::services::tracker::{AisleTracker, TrackUpdate, TrackerState, TrackingParams};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Runs a cycle on every Nth received frame
#[derive(Debug, Clone)]
pub struct FrameSampler {
    every: u64,
    seen: u64,
}

impl FrameSampler {
    /// `every` of 0 is treated as 1
    pub fn new(every: u64) -> Self {
        Self { every: every.max(1), seen: 0 }
    }

    /// Count a received frame; true if it should run a cycle
    ///
    /// Cycles run on the Nth, 2Nth, ... frame.
    #[inline]
    pub fn admit(&mut self) -> bool {
        self.seen += 1;
        self.seen % self.every == 0
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }
}

/// Everything one cycle produced
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub report: CycleReport,
    /// Alerts first raised this cycle
    pub alerts: Vec<IllegalParkingAlert>,
    pub update: TrackUpdate,
}

/// Region classification, tracking and reporting over a fixed region set
pub struct ParkingMonitor {
    regions: Regions,
    tracker: AisleTracker,
    detector: IllegalParkingDetector,
    state: TrackerState,
    cycles: u64,
    metrics: Arc<Metrics>,
}

impl ParkingMonitor {
    pub fn new(regions: Regions, params: TrackingParams, metrics: Arc<Metrics>) -> Self {
        Self {
            regions,
            tracker: AisleTracker::new(params),
            detector: IllegalParkingDetector::new(params.dwell),
            state: TrackerState::new(),
            cycles: 0,
            metrics,
        }
    }

    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Cycles completed so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one full cycle over this frame's detections
    pub fn run_cycle(&mut self, detections: &[Detection]) -> CycleOutcome {
        let start = Instant::now();
        self.cycles += 1;

        let classification = classify(&self.regions, detections);
        let update = self.tracker.update(&mut self.state, &classification.aisle);
        let alerts = self.detector.scan(self.state.vehicles_mut());
        let report =
            build_report(&classification.snapshot, self.state.vehicles(), self.detector.policy());

        let latency_us = start.elapsed().as_micros() as u64;
        self.metrics.record_cycle(latency_us);
        self.metrics.record_detections(
            detections.len() - classification.outside_zone,
            classification.outside_zone,
            classification.aisle.len(),
        );
        self.metrics.record_vehicle_churn(update.created.len(), update.dropped.len());
        self.metrics.record_alerts(alerts.len());
        self.metrics.set_cycle_gauges(
            report.occupied_count(),
            self.state.len(),
            report.illegal_count,
        );

        info!(
            cycle = %self.cycles,
            occupied = %format!("{}/{}", report.occupied_count(), report.slots.len()),
            aisle = %classification.aisle.len(),
            tracked = %self.state.len(),
            illegal = %report.illegal_count,
            latency_us = %latency_us,
            "cycle_completed"
        );
        if report.illegal_count > 0 {
            info!(
                cars = %serde_json::to_string(&report.illegal_cars).unwrap_or_default(),
                "illegal_cars"
            );
        }

        CycleOutcome { report, alerts, update }
    }
}

/// Async driver: sampled batches in, report envelopes out
pub struct MonitorLoop {
    monitor: ParkingMonitor,
    sampler: FrameSampler,
    site: String,
    session: String,
    reports: ReportSender,
    metrics: Arc<Metrics>,
}

impl MonitorLoop {
    pub fn new(
        monitor: ParkingMonitor,
        sampler: FrameSampler,
        site: String,
        session: String,
        reports: ReportSender,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { monitor, sampler, site, session, reports, metrics }
    }

    /// Sample one batch and run a cycle if admitted
    pub fn handle_batch(&mut self, batch: &DetectionBatch) -> Option<ReportEnvelope> {
        if !self.sampler.admit() {
            self.metrics.record_frame_skipped();
            debug!(frame = ?batch.frame, "frame_skipped");
            return None;
        }

        let outcome = self.monitor.run_cycle(&batch.detections());
        Some(ReportEnvelope {
            site: self.site.clone(),
            session: self.session.clone(),
            cycle: self.monitor.cycles(),
            frame: batch.frame,
            timestamp: Utc::now(),
            report: outcome.report,
            alerts: outcome.alerts,
        })
    }

    /// Process batches until the channel closes or shutdown is signalled
    ///
    /// Returns the number of cycles run.
    pub async fn run(
        mut self,
        mut batch_rx: mpsc::Receiver<DetectionBatch>,
        mut shutdown: watch::Receiver<bool>,
    ) -> u64 {
        info!(
            site = %self.site,
            session = %self.session,
            slots = %self.monitor.regions().slot_count(),
            "monitor_started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(cycles = %self.monitor.cycles(), "monitor_shutdown");
                        break;
                    }
                }
                batch = batch_rx.recv() => {
                    let Some(batch) = batch else {
                        info!(cycles = %self.monitor.cycles(), "monitor_input_closed");
                        break;
                    };
                    if let Some(envelope) = self.handle_batch(&batch) {
                        self.reports.send(envelope);
                    }
                }
            }
        }

        self.monitor.cycles()
    }
}
