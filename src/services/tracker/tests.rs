//! Tests for the aisle tracker

use super::*;
use crate::services::dwell::IllegalParkingDetector;

/// Detection centered on (cx, cy) with a 40x20 box
fn det_at(cx: i32, cy: i32) -> Detection {
    Detection::from_corners(cx - 20, cy - 10, cx + 20, cy + 10)
}

fn tracker(radius: f64, threshold: f64, limit: u32) -> AisleTracker {
    AisleTracker::new(TrackingParams {
        match_radius: radius,
        dwell: DwellPolicy::new(threshold, limit),
    })
}

fn default_tracker() -> AisleTracker {
    AisleTracker::new(TrackingParams::default())
}

#[test]
fn test_first_cycle_creates_vehicles() {
    let tracker = default_tracker();
    let mut state = TrackerState::new();

    let update = tracker.update(&mut state, &[det_at(100, 100), det_at(400, 100)]);

    assert_eq!(update.created, vec![VehicleId(0), VehicleId(1)]);
    assert!(update.matched.is_empty());
    assert!(update.dropped.is_empty());
    assert_eq!(state.len(), 2);
    assert_eq!(state.next_id(), 2);
    assert!(state.vehicles().iter().all(|v| v.dwell_timer == 0 && !v.alerted));
}

#[test]
fn test_stationary_vehicle_dwell_sequence() {
    // limit = 3, threshold = 30: dwell 0,1,2,3 and illegal only on cycle 4
    let tracker = tracker(100.0, 30.0, 3);
    let detector = IllegalParkingDetector::new(tracker.params().dwell);
    let mut state = TrackerState::new();

    let mut dwell = Vec::new();
    let mut illegal = Vec::new();
    let mut alerts_per_cycle = Vec::new();

    for _ in 0..4 {
        tracker.update(&mut state, &[det_at(100, 100)]);
        let alerts = detector.scan(state.vehicles_mut());
        let v = &state.vehicles()[0];
        dwell.push(v.dwell_timer);
        illegal.push(tracker.params().dwell.is_illegal(v));
        alerts_per_cycle.push(alerts.len());
    }

    assert_eq!(dwell, vec![0, 1, 2, 3]);
    assert_eq!(illegal, vec![false, false, false, true]);
    assert_eq!(alerts_per_cycle, vec![0, 0, 0, 1]);
    assert_eq!(state.vehicles()[0].id, VehicleId(0));
}

#[test]
fn test_movement_resets_dwell() {
    let tracker = tracker(100.0, 30.0, 30);
    let mut state = TrackerState::new();

    tracker.update(&mut state, &[det_at(100, 100)]);
    for _ in 0..5 {
        tracker.update(&mut state, &[det_at(100, 100)]);
    }
    assert_eq!(state.vehicles()[0].dwell_timer, 5);

    // Moves 50px: still matched (< radius) but not stationary
    let update = tracker.update(&mut state, &[det_at(150, 100)]);
    assert_eq!(update.matched, vec![VehicleId(0)]);
    assert_eq!(state.vehicles()[0].dwell_timer, 0);

    // Stationary again from the new position
    tracker.update(&mut state, &[det_at(151, 101)]);
    assert_eq!(state.vehicles()[0].dwell_timer, 1);
}

#[test]
fn test_nearest_track_keeps_identity() {
    let tracker = default_tracker();
    let mut state = TrackerState::new();

    tracker.update(&mut state, &[det_at(50, 50), det_at(60, 50)]);
    assert_eq!(state.vehicles()[0].id, VehicleId(0));
    assert_eq!(state.vehicles()[1].id, VehicleId(1));

    let update = tracker.update(&mut state, &[det_at(52, 51), det_at(300, 300)]);

    // (52,51) goes to the vehicle at (50,50); (300,300) is out of range of both
    assert_eq!(update.matched, vec![VehicleId(0)]);
    assert_eq!(update.created, vec![VehicleId(2)]);
    assert_eq!(update.dropped, vec![VehicleId(1)]);

    let matched = state.get(VehicleId(0)).unwrap();
    assert_eq!(matched.center, Point::new(52, 51));
    assert_eq!(matched.dwell_timer, 1);
    assert_eq!(state.get(VehicleId(2)).unwrap().center, Point::new(300, 300));
    assert!(state.get(VehicleId(1)).is_none());
}

#[test]
fn test_passing_vehicle_does_not_steal_identity() {
    let tracker = tracker(100.0, 30.0, 30);
    let mut state = TrackerState::new();

    // Parked vehicle 0 at (100,100) with some dwell
    tracker.update(&mut state, &[det_at(100, 100)]);
    tracker.update(&mut state, &[det_at(100, 100)]);
    tracker.update(&mut state, &[det_at(100, 100)]);
    assert_eq!(state.vehicles()[0].dwell_timer, 2);

    // A new vehicle appears nearby while the parked one stays put
    tracker.update(&mut state, &[det_at(160, 100), det_at(100, 100)]);

    let parked = state.get(VehicleId(0)).unwrap();
    assert_eq!(parked.center, Point::new(100, 100));
    assert_eq!(parked.dwell_timer, 3);
    assert_eq!(state.get(VehicleId(1)).unwrap().center, Point::new(160, 100));
}

#[test]
fn test_drop_on_miss_is_permanent() {
    let tracker = default_tracker();
    let mut state = TrackerState::new();

    tracker.update(&mut state, &[det_at(200, 200)]);
    tracker.update(&mut state, &[det_at(200, 200)]);
    assert_eq!(state.vehicles()[0].dwell_timer, 1);

    // Cycle n: vehicle missing
    let update = tracker.update(&mut state, &[]);
    assert_eq!(update.dropped, vec![VehicleId(0)]);
    assert!(state.is_empty());

    // Cycle n+1: reappears at the same spot, gets a new identity
    let update = tracker.update(&mut state, &[det_at(200, 200)]);
    assert_eq!(update.created, vec![VehicleId(1)]);
    assert_eq!(state.vehicles()[0].dwell_timer, 0);
    assert!(state.get(VehicleId(0)).is_none());
}

#[test]
fn test_out_of_radius_is_new_vehicle() {
    let tracker = tracker(100.0, 30.0, 30);
    let mut state = TrackerState::new();

    tracker.update(&mut state, &[det_at(0, 0)]);
    let update = tracker.update(&mut state, &[det_at(100, 0)]);

    assert_eq!(update.dropped, vec![VehicleId(0)]);
    assert_eq!(update.created, vec![VehicleId(1)]);
}

#[test]
fn test_ids_never_reused() {
    let tracker = default_tracker();
    let mut state = TrackerState::new();

    let mut seen = Vec::new();
    for i in 0..10 {
        // Each cycle jumps far away so nothing ever matches
        let x = (i % 2) * 1000;
        let update = tracker.update(&mut state, &[det_at(x, 0), det_at(x, 500)]);
        seen.extend(update.created);
    }

    let mut dedup = seen.clone();
    dedup.sort();
    dedup.dedup();
    assert_eq!(dedup.len(), seen.len());
    assert_eq!(state.next_id(), 20);
}

#[test]
fn test_output_order_matched_then_new() {
    let tracker = default_tracker();
    let mut state = TrackerState::new();

    tracker.update(&mut state, &[det_at(100, 100), det_at(400, 100)]);
    // Vehicle 1 matches more closely than vehicle 0, new detection first in input
    tracker.update(&mut state, &[det_at(800, 800), det_at(140, 100), det_at(401, 100)]);

    let ids: Vec<u64> = state.vehicles().iter().map(|v| v.id.0).collect();
    assert_eq!(ids, vec![1, 0, 2]);
}

#[test]
fn test_alert_latch_survives_movement() {
    let tracker = tracker(100.0, 30.0, 2);
    let detector = IllegalParkingDetector::new(tracker.params().dwell);
    let mut state = TrackerState::new();

    let mut total_alerts = 0;
    for _ in 0..3 {
        tracker.update(&mut state, &[det_at(100, 100)]);
        total_alerts += detector.scan(state.vehicles_mut()).len();
    }
    assert_eq!(total_alerts, 1);
    assert!(state.vehicles()[0].alerted);

    // Moves, then settles again past the limit: still no second alert
    tracker.update(&mut state, &[det_at(150, 100)]);
    assert!(state.vehicles()[0].alerted);
    for _ in 0..3 {
        tracker.update(&mut state, &[det_at(150, 100)]);
        total_alerts += detector.scan(state.vehicles_mut()).len();
    }
    assert_eq!(total_alerts, 1);
    assert!(state.vehicles()[0].alerted);
}

#[test]
fn test_matching_is_deterministic() {
    let tracker = default_tracker();
    let cycles: Vec<Vec<Detection>> = vec![
        vec![det_at(50, 50), det_at(60, 50), det_at(70, 50)],
        vec![det_at(55, 50), det_at(65, 50), det_at(75, 50)],
        vec![det_at(65, 50), det_at(55, 50)],
        vec![det_at(60, 50), det_at(60, 50), det_at(60, 50)],
    ];

    let run = || {
        let mut state = TrackerState::new();
        let mut history = Vec::new();
        for aisle in &cycles {
            let update = tracker.update(&mut state, aisle);
            let snapshot: Vec<(u64, u32)> =
                state.vehicles().iter().map(|v| (v.id.0, v.dwell_timer)).collect();
            history.push((update, snapshot));
        }
        history
    };

    assert_eq!(run(), run());
}
