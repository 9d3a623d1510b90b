//! Services - cycle logic and state management
//!
//! - `geometry` - Point-in-polygon test
//! - `occupancy` - Monitor zone filter and slot occupancy
//! - `tracker` - Aisle vehicle association and identity
//! - `dwell` - Dwell timer and illegal parking detection
//! - `report_builder` - Cycle report assembly
//! - `monitor` - Cycle orchestration and the async monitor loop
//! - `sink_worker` - Async report delivery worker

pub mod dwell;
pub mod geometry;
pub mod monitor;
pub mod occupancy;
pub mod report_builder;
pub mod sink_worker;
pub mod tracker;

pub use monitor::{CycleOutcome, FrameSampler, MonitorLoop, ParkingMonitor};
pub use sink_worker::{create_sink_worker, ReportSender, SinkWorker};
pub use tracker::{AisleTracker, TrackerState, TrackingParams};
