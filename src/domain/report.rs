//! Cycle report data model
//!
//! Shape matches what downstream consumers already accept:
//! `{"slots": [...], "illegal_cars": [...], "illegal_count": N}`

use crate::domain::types::{Point, VehicleId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Message attached to every illegal car entry
pub const ILLEGAL_PARKING_MSG: &str = "Illegal Parking";

/// Slot status as reported downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Occupied,
    Empty,
}

impl SlotStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Occupied => "occupied",
            SlotStatus::Empty => "empty",
        }
    }

    /// Numeric form used on the relay status topic
    #[inline]
    pub fn as_flag(&self) -> u8 {
        match self {
            SlotStatus::Occupied => 1,
            SlotStatus::Empty => 0,
        }
    }
}

/// One parking slot entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotReport {
    /// `slot1`..`slotN`
    #[serde(rename = "slot")]
    pub label: String,
    pub status: SlotStatus,
    pub confidence: f64,
}

/// One currently illegal vehicle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IllegalCar {
    pub id: u64,
    /// Dwell timer in cycles
    pub duration: u32,
    pub x: i32,
    pub y: i32,
    pub msg: &'static str,
}

/// Per-cycle result handed to the report sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub slots: Vec<SlotReport>,
    pub illegal_cars: Vec<IllegalCar>,
    pub illegal_count: usize,
}

impl CycleReport {
    /// Number of occupied slots
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.status == SlotStatus::Occupied).count()
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> String {
        // Only plain structs/strings/numbers, serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Emitted once per vehicle lifetime when it first crosses the dwell limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IllegalParkingAlert {
    pub id: VehicleId,
    pub position: Point,
    pub dwell_timer: u32,
}

/// A cycle report plus the run context sinks need to route it
#[derive(Debug, Clone, Serialize)]
pub struct ReportEnvelope {
    pub site: String,
    /// Per-process session id; vehicle ids restart with every session
    pub session: String,
    /// 1-based cycle counter within the session
    pub cycle: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<u64>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub report: CycleReport,
    /// Alerts first raised in this cycle
    #[serde(skip)]
    pub alerts: Vec<IllegalParkingAlert>,
}

impl ReportEnvelope {
    /// Serialize to compact JSON (report fields flattened alongside the context)
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
