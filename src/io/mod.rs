//! IO modules - external system interfaces
//!
//! - `mqtt` - MQTT client receiving detector box batches
//! - `replay` - JSON Lines detection source
//! - `sink` - Report sink trait and selection
//! - `http_sink` - Report POST to the downstream collector
//! - `mqtt_egress` - Report relay to MQTT status topics
//! - `egress` - Report output to file (JSONL format)
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod egress;
pub mod http_sink;
pub mod mqtt;
pub mod mqtt_egress;
pub mod prometheus;
pub mod replay;
pub mod sink;

pub use sink::{build_sink, NullSink, ReportSink};
