//! Cycle report assembly
//!
//! Pure aggregation of the occupancy snapshot and the tracked set. Slot
//! confidence is a fixed placeholder (the detector does not supply per-slot
//! scores), not a learned value.

use crate::domain::report::{CycleReport, IllegalCar, SlotReport, SlotStatus, ILLEGAL_PARKING_MSG};
use crate::domain::types::TrackedVehicle;
use crate::services::dwell::DwellPolicy;
use crate::services::occupancy::OccupancySnapshot;

/// Placeholder confidence for an occupied slot
pub const OCCUPIED_CONFIDENCE: f64 = 0.95;
/// Placeholder confidence for an empty slot
pub const EMPTY_CONFIDENCE: f64 = 0.0;

/// Report label for a zero-based slot index
#[inline]
pub fn slot_label(index: usize) -> String {
    format!("slot{}", index + 1)
}

/// Build one report entry per slot, labelled by 1-based index
pub fn slot_reports(snapshot: &OccupancySnapshot) -> Vec<SlotReport> {
    snapshot
        .flags()
        .iter()
        .enumerate()
        .map(|(idx, &occupied)| {
            let (status, confidence) = if occupied {
                (SlotStatus::Occupied, OCCUPIED_CONFIDENCE)
            } else {
                (SlotStatus::Empty, EMPTY_CONFIDENCE)
            };
            SlotReport { label: slot_label(idx), status, confidence }
        })
        .collect()
}

/// One entry per currently illegal vehicle, in tracked-set order
pub fn illegal_cars(vehicles: &[TrackedVehicle], policy: &DwellPolicy) -> Vec<IllegalCar> {
    vehicles
        .iter()
        .filter(|v| policy.is_illegal(v))
        .map(|v| IllegalCar {
            id: v.id.0,
            duration: v.dwell_timer,
            x: v.center.x,
            y: v.center.y,
            msg: ILLEGAL_PARKING_MSG,
        })
        .collect()
}

/// Assemble the full cycle report
pub fn build_report(
    snapshot: &OccupancySnapshot,
    vehicles: &[TrackedVehicle],
    policy: &DwellPolicy,
) -> CycleReport {
    let illegal_cars = illegal_cars(vehicles, policy);
    CycleReport { slots: slot_reports(snapshot), illegal_count: illegal_cars.len(), illegal_cars }
}
