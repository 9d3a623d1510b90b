//! Domain models - core types shared by every layer
//!
//! - `types` - detections, bounding boxes, tracked aisle vehicles
//! - `report` - per-cycle report, illegal car entries, alerts

pub mod report;
pub mod types;

pub use report::{CycleReport, IllegalParkingAlert, ReportEnvelope};
pub use types::{Detection, DetectionBatch, Point, TrackedVehicle, VehicleId};
