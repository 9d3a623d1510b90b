//! Dwell timer and illegal-parking detection
//!
//! The dwell timer counts consecutive cycles in which a tracked aisle vehicle
//! moved less than the movement threshold. Units are cycles, not seconds;
//! the real-world meaning depends on the sampling cadence staying constant.

use crate::domain::report::IllegalParkingAlert;
use crate::domain::types::TrackedVehicle;
use tracing::warn;

/// Default movement threshold (pixels) below which a vehicle counts as stationary
pub const DEFAULT_MOVEMENT_THRESHOLD: f64 = 30.0;
/// Default dwell limit (cycles) at which a vehicle becomes illegal
pub const DEFAULT_ILLEGAL_TIME_LIMIT: u32 = 30;

/// Dwell advancement and classification rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellPolicy {
    pub movement_threshold: f64,
    pub time_limit: u32,
}

impl Default for DwellPolicy {
    fn default() -> Self {
        Self { movement_threshold: DEFAULT_MOVEMENT_THRESHOLD, time_limit: DEFAULT_ILLEGAL_TIME_LIMIT }
    }
}

impl DwellPolicy {
    pub fn new(movement_threshold: f64, time_limit: u32) -> Self {
        Self { movement_threshold, time_limit }
    }

    /// Advance a matched vehicle's timer given how far it moved this cycle
    ///
    /// Returns true if the vehicle was considered stationary.
    #[inline]
    pub fn advance(&self, vehicle: &mut TrackedVehicle, movement: f64) -> bool {
        if movement < self.movement_threshold {
            vehicle.dwell_timer = vehicle.dwell_timer.saturating_add(1);
            true
        } else {
            vehicle.dwell_timer = 0;
            false
        }
    }

    #[inline]
    pub fn is_illegal(&self, vehicle: &TrackedVehicle) -> bool {
        vehicle.dwell_timer >= self.time_limit
    }
}

/// Flags vehicles over the dwell limit and latches their one-time alert
#[derive(Debug, Clone, Copy, Default)]
pub struct IllegalParkingDetector {
    policy: DwellPolicy,
}

impl IllegalParkingDetector {
    pub fn new(policy: DwellPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DwellPolicy {
        &self.policy
    }

    /// Latch alerts for vehicles crossing the limit for the first time
    ///
    /// Vehicles already alerted are left alone; they keep appearing in reports
    /// for as long as they stay illegal and tracked.
    pub fn scan(&self, vehicles: &mut [TrackedVehicle]) -> Vec<IllegalParkingAlert> {
        let mut alerts = Vec::new();

        for vehicle in vehicles.iter_mut() {
            if !self.policy.is_illegal(vehicle) || vehicle.alerted {
                continue;
            }

            vehicle.alerted = true;
            warn!(
                vehicle_id = %vehicle.id,
                x = %vehicle.center.x,
                y = %vehicle.center.y,
                dwell = %vehicle.dwell_timer,
                limit = %self.policy.time_limit,
                "illegal_parking_confirmed"
            );
            alerts.push(IllegalParkingAlert {
                id: vehicle.id,
                position: vehicle.center,
                dwell_timer: vehicle.dwell_timer,
            });
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Detection, VehicleId};

    fn vehicle(id: u64) -> TrackedVehicle {
        TrackedVehicle::new(VehicleId(id), &Detection::from_corners(90, 90, 110, 110))
    }

    #[test]
    fn test_stationary_increments() {
        let policy = DwellPolicy::new(30.0, 3);
        let mut v = vehicle(0);
        for expected in 1..=5 {
            assert!(policy.advance(&mut v, 0.0));
            assert_eq!(v.dwell_timer, expected);
        }
    }

    #[test]
    fn test_movement_at_threshold_resets() {
        let policy = DwellPolicy::new(30.0, 3);
        let mut v = vehicle(0);
        policy.advance(&mut v, 29.9);
        policy.advance(&mut v, 10.0);
        assert_eq!(v.dwell_timer, 2);

        assert!(!policy.advance(&mut v, 30.0));
        assert_eq!(v.dwell_timer, 0);
    }

    #[test]
    fn test_is_illegal_at_limit() {
        let policy = DwellPolicy::new(30.0, 3);
        let mut v = vehicle(0);
        v.dwell_timer = 2;
        assert!(!policy.is_illegal(&v));
        v.dwell_timer = 3;
        assert!(policy.is_illegal(&v));
    }

    #[test]
    fn test_alert_latches_once() {
        let detector = IllegalParkingDetector::new(DwellPolicy::new(30.0, 3));
        let mut vehicles = vec![vehicle(7)];
        vehicles[0].dwell_timer = 3;

        let alerts = detector.scan(&mut vehicles);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, VehicleId(7));
        assert_eq!(alerts[0].dwell_timer, 3);
        assert!(vehicles[0].alerted);

        vehicles[0].dwell_timer = 4;
        assert!(detector.scan(&mut vehicles).is_empty());
        assert!(vehicles[0].alerted);
    }

    #[test]
    fn test_alert_stays_latched_after_reset() {
        let detector = IllegalParkingDetector::new(DwellPolicy::new(30.0, 2));
        let mut vehicles = vec![vehicle(1)];
        vehicles[0].dwell_timer = 2;
        assert_eq!(detector.scan(&mut vehicles).len(), 1);

        // Moves, comes to rest again and re-crosses the limit
        vehicles[0].dwell_timer = 0;
        assert!(detector.scan(&mut vehicles).is_empty());
        vehicles[0].dwell_timer = 2;
        assert!(detector.scan(&mut vehicles).is_empty());
        assert!(vehicles[0].alerted);
    }

    #[test]
    fn test_below_limit_no_alert() {
        let detector = IllegalParkingDetector::default();
        let mut vehicles = vec![vehicle(1), vehicle(2)];
        vehicles[1].dwell_timer = DEFAULT_ILLEGAL_TIME_LIMIT - 1;
        assert!(detector.scan(&mut vehicles).is_empty());
        assert!(!vehicles.iter().any(|v| v.alerted));
    }
}
