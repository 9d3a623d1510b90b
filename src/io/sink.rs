//! Report sink interface
//!
//! A sink receives one [`ReportEnvelope`] per cycle. Implementations:
//! - `HttpSink` - POST to the downstream collector
//! - `MqttRelaySink` - per-slot status and illegal vehicle topics
//! - `FileSink` - JSONL append
//! - `NullSink` - discard (logs carry the result)

use crate::domain::report::ReportEnvelope;
use crate::infra::config::{Config, SinkMode};
use crate::io::egress::FileSink;
use crate::io::http_sink::HttpSink;
use crate::io::mqtt_egress::MqttRelaySink;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Destination for cycle reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Deliver one report; an error means the report was not accepted
    async fn deliver(&self, envelope: &ReportEnvelope) -> anyhow::Result<()>;
}

/// Discards every report
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl ReportSink for NullSink {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn deliver(&self, _envelope: &ReportEnvelope) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Build the sink selected by `[sink] mode`
///
/// Must be called inside the tokio runtime (the MQTT relay spawns its eventloop).
pub fn build_sink(config: &Config) -> anyhow::Result<Arc<dyn ReportSink>> {
    let sink: Arc<dyn ReportSink> = match config.sink_mode() {
        SinkMode::Http => Arc::new(HttpSink::new(config.sink_http_url(), config.sink_timeout_ms())?),
        SinkMode::Mqtt => Arc::new(MqttRelaySink::new(config)),
        SinkMode::File => Arc::new(FileSink::new(config.sink_file())),
        SinkMode::None => Arc::new(NullSink),
    };
    info!(sink = %sink.name(), "report_sink_selected");
    Ok(sink)
}
