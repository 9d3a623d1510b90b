//! Aisle vehicle tracking
//!
//! Keeps identity for detections that are not in any parking slot:
//! - Global greedy nearest-neighbor association against last cycle's vehicles
//! - Matched vehicles advance their dwell timer
//! - Unmatched detections become new vehicles with fresh IDs
//! - Unmatched vehicles are dropped immediately (no grace period)
//!
//! All cross-cycle state lives in [`TrackerState`], owned by the caller and
//! passed into every update. Nothing here is global.

mod matching;
#[cfg(test)]
mod tests;

pub use matching::{greedy_assign, Assignment, DEFAULT_MATCH_RADIUS};

use crate::domain::types::{Detection, Point, TrackedVehicle, VehicleId};
use crate::infra::config::Config;
use crate::services::dwell::DwellPolicy;
use tracing::debug;

/// Tracking parameters, fixed for a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingParams {
    /// Association radius; pairs at or beyond it are never matched
    pub match_radius: f64,
    pub dwell: DwellPolicy,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self { match_radius: DEFAULT_MATCH_RADIUS, dwell: DwellPolicy::default() }
    }
}

impl TrackingParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            match_radius: config.match_radius(),
            dwell: DwellPolicy::new(config.movement_threshold(), config.illegal_time_limit()),
        }
    }
}

/// Cross-cycle tracker state: the tracked set and the ID counter
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    vehicles: Vec<TrackedVehicle>,
    next_id: u64,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vehicles(&self) -> &[TrackedVehicle] {
        &self.vehicles
    }

    pub(crate) fn vehicles_mut(&mut self) -> &mut [TrackedVehicle] {
        &mut self.vehicles
    }

    /// ID the next new vehicle will receive
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn get(&self, id: VehicleId) -> Option<&TrackedVehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    fn allocate_id(&mut self) -> VehicleId {
        let id = VehicleId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// What changed in one tracker update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackUpdate {
    /// Vehicles matched this cycle
    pub matched: Vec<VehicleId>,
    /// Vehicles created this cycle
    pub created: Vec<VehicleId>,
    /// Vehicles dropped this cycle (terminal)
    pub dropped: Vec<VehicleId>,
}

/// Stateless association and dwell logic over an external [`TrackerState`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AisleTracker {
    params: TrackingParams,
}

impl AisleTracker {
    pub fn new(params: TrackingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrackingParams {
        &self.params
    }

    /// Associate this cycle's aisle detections with the tracked set
    ///
    /// The resulting tracked set holds matched vehicles in acceptance order,
    /// followed by new vehicles in detection order.
    pub fn update(&self, state: &mut TrackerState, aisle: &[Detection]) -> TrackUpdate {
        let previous = std::mem::take(&mut state.vehicles);
        let track_centers: Vec<Point> = previous.iter().map(|v| v.center).collect();
        let detection_centers: Vec<Point> = aisle.iter().map(|d| d.center).collect();

        let assignments =
            greedy_assign(&track_centers, &detection_centers, self.params.match_radius);

        let mut slots: Vec<Option<TrackedVehicle>> = previous.into_iter().map(Some).collect();
        let mut detection_used = vec![false; aisle.len()];
        let mut next = Vec::with_capacity(aisle.len());
        let mut update = TrackUpdate::default();

        for Assignment { track_idx, detection_idx, distance } in assignments {
            let Some(mut vehicle) = slots[track_idx].take() else { continue };
            let detection = &aisle[detection_idx];

            let stationary = self.params.dwell.advance(&mut vehicle, distance);
            vehicle.center = detection.center;
            vehicle.bbox = detection.bbox;

            debug!(
                vehicle_id = %vehicle.id,
                movement = %format!("{distance:.2}"),
                stationary = %stationary,
                dwell = %vehicle.dwell_timer,
                "vehicle_matched"
            );

            detection_used[detection_idx] = true;
            update.matched.push(vehicle.id);
            next.push(vehicle);
        }

        for (detection, used) in aisle.iter().zip(&detection_used) {
            if *used {
                continue;
            }
            let vehicle = TrackedVehicle::new(state.allocate_id(), detection);
            debug!(vehicle_id = %vehicle.id, center = %vehicle.center, "vehicle_created");
            update.created.push(vehicle.id);
            next.push(vehicle);
        }

        for vehicle in slots.into_iter().flatten() {
            debug!(
                vehicle_id = %vehicle.id,
                dwell = %vehicle.dwell_timer,
                alerted = %vehicle.alerted,
                "vehicle_dropped"
            );
            update.dropped.push(vehicle.id);
        }

        state.vehicles = next;
        update
    }
}
