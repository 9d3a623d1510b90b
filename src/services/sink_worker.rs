//! Report sink worker - delivers reports off the cycle path
//!
//! The monitor loop enqueues one job per cycle through an mpsc channel and
//! never waits on network or disk. The worker delivers each report with a
//! per-delivery timeout; failures are logged and counted, never retried.

use crate::domain::report::ReportEnvelope;
use crate::infra::metrics::Metrics;
use crate::io::sink::ReportSink;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// A report waiting for delivery
#[derive(Debug)]
pub struct SinkJob {
    pub envelope: ReportEnvelope,
    /// When the job was enqueued (for queue delay measurement)
    pub enqueued_at: Instant,
}

/// Cycle-side handle for enqueueing reports
#[derive(Clone)]
pub struct ReportSender {
    tx: mpsc::Sender<SinkJob>,
    metrics: Arc<Metrics>,
}

impl ReportSender {
    /// Enqueue without blocking; returns false when the report was dropped
    pub fn send(&self, envelope: ReportEnvelope) -> bool {
        let cycle = envelope.cycle;
        match self.tx.try_send(SinkJob { envelope, enqueued_at: Instant::now() }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.metrics.record_report_dropped();
                warn!(cycle = %cycle, "report_dropped: sink queue full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.record_report_dropped();
                debug!(cycle = %cycle, "report_dropped: sink worker stopped");
                false
            }
        }
    }
}

/// Worker that delivers reports to the configured sink
pub struct SinkWorker {
    sink: Arc<dyn ReportSink>,
    rx: mpsc::Receiver<SinkJob>,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl SinkWorker {
    pub fn new(
        sink: Arc<dyn ReportSink>,
        rx: mpsc::Receiver<SinkJob>,
        timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { sink, rx, timeout, metrics }
    }

    /// Run the worker, delivering reports until every sender is dropped
    pub async fn run(mut self) {
        info!(sink = %self.sink.name(), timeout_ms = %self.timeout.as_millis(), "sink_worker_started");

        while let Some(job) = self.rx.recv().await {
            self.deliver(job).await;
        }

        info!("sink_worker_stopped");
    }

    async fn deliver(&self, job: SinkJob) {
        let queue_delay_us = job.enqueued_at.elapsed().as_micros() as u64;
        let start = Instant::now();
        let cycle = job.envelope.cycle;

        match tokio::time::timeout(self.timeout, self.sink.deliver(&job.envelope)).await {
            Ok(Ok(())) => {
                let latency_us = start.elapsed().as_micros() as u64;
                self.metrics.record_report_delivered(latency_us);
                debug!(
                    cycle = %cycle,
                    sink = %self.sink.name(),
                    queue_delay_us = %queue_delay_us,
                    latency_us = %latency_us,
                    "report_delivered"
                );
            }
            Ok(Err(e)) => {
                self.metrics.record_report_failed();
                warn!(
                    cycle = %cycle,
                    sink = %self.sink.name(),
                    error = %format!("{e:#}"),
                    "report_delivery_failed"
                );
            }
            Err(_) => {
                self.metrics.record_report_failed();
                warn!(
                    cycle = %cycle,
                    sink = %self.sink.name(),
                    timeout_ms = %self.timeout.as_millis(),
                    "report_delivery_timeout"
                );
            }
        }
    }
}

/// Create a report channel and worker
///
/// Returns the sender (for the monitor loop) and the worker (to be spawned)
pub fn create_sink_worker(
    sink: Arc<dyn ReportSink>,
    timeout: Duration,
    metrics: Arc<Metrics>,
    buffer_size: usize,
) -> (ReportSender, SinkWorker) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let sender = ReportSender { tx, metrics: metrics.clone() };
    let worker = SinkWorker::new(sink, rx, timeout, metrics);
    (sender, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::CycleReport;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    fn envelope(cycle: u64) -> ReportEnvelope {
        ReportEnvelope {
            site: "lot".to_string(),
            session: "s".to_string(),
            cycle,
            frame: None,
            timestamp: Utc::now(),
            report: CycleReport { slots: vec![], illegal_cars: vec![], illegal_count: 0 },
            alerts: vec![],
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        cycles: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver(&self, envelope: &ReportEnvelope) -> anyhow::Result<()> {
            self.cycles.lock().push(envelope.cycle);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ReportSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn deliver(&self, _envelope: &ReportEnvelope) -> anyhow::Result<()> {
            anyhow::bail!("collector unavailable")
        }
    }

    struct SlowSink;

    #[async_trait]
    impl ReportSink for SlowSink {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn deliver(&self, _envelope: &ReportEnvelope) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delivers_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let metrics = Arc::new(Metrics::new());
        let (sender, worker) =
            create_sink_worker(sink.clone(), Duration::from_millis(500), metrics.clone(), 8);

        for cycle in 1..=3 {
            assert!(sender.send(envelope(cycle)));
        }
        drop(sender);
        worker.run().await;

        assert_eq!(*sink.cycles.lock(), vec![1, 2, 3]);
        assert_eq!(metrics.reports_delivered(), 3);
        assert_eq!(metrics.reports_failed(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_counted_not_fatal() {
        let metrics = Arc::new(Metrics::new());
        let (sender, worker) =
            create_sink_worker(Arc::new(FailingSink), Duration::from_millis(500), metrics.clone(), 8);

        sender.send(envelope(1));
        sender.send(envelope(2));
        drop(sender);
        worker.run().await;

        assert_eq!(metrics.reports_failed(), 2);
        assert_eq!(metrics.reports_delivered(), 0);
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let metrics = Arc::new(Metrics::new());
        let (sender, worker) =
            create_sink_worker(Arc::new(SlowSink), Duration::from_millis(100), metrics.clone(), 8);

        sender.send(envelope(1));
        drop(sender);
        worker.run().await;

        assert_eq!(metrics.reports_failed(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let metrics = Arc::new(Metrics::new());
        let (sender, _worker) = create_sink_worker(
            Arc::new(RecordingSink::default()),
            Duration::from_millis(500),
            metrics.clone(),
            1,
        );

        assert!(sender.send(envelope(1)));
        assert!(!sender.send(envelope(2)));
        assert_eq!(metrics.reports_dropped(), 1);
    }
}
