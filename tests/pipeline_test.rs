//! End-to-end cycles through the monitor, from wire batches to reports

use parking_monitor::domain::DetectionBatch;
use parking_monitor::infra::{Metrics, Regions};
use parking_monitor::io::replay::DetectionReader;
use parking_monitor::services::geometry::Polygon;
use parking_monitor::services::{FrameSampler, ParkingMonitor, TrackingParams};
use parking_monitor::services::dwell::DwellPolicy;
use std::io::Cursor;
use std::sync::Arc;

/// 640x480 frame, three slots across the top, aisle below
fn regions() -> Regions {
    Regions::from_parts(
        Polygon::from(vec![[0, 0], [640, 0], [640, 480], [0, 480]]),
        vec![
            vec![[0, 0], [100, 0], [100, 100], [0, 100]],
            vec![[120, 0], [220, 0], [220, 100], [120, 100]],
            vec![[240, 0], [340, 0], [340, 100], [240, 100]],
        ],
    )
    .unwrap()
}

fn monitor(limit: u32) -> ParkingMonitor {
    let params = TrackingParams { match_radius: 100.0, dwell: DwellPolicy::new(30.0, limit) };
    ParkingMonitor::new(regions(), params, Arc::new(Metrics::new()))
}

fn batch(json: &str) -> DetectionBatch {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_occupancy_report_shape() {
    let mut monitor = monitor(30);
    let outcome = monitor.run_cycle(
        &batch(r#"{"frame": 0, "boxes": [[30, 30, 70, 70], [250, 20, 330, 80], [700, 700, 720, 720]]}"#)
            .detections(),
    );

    let json: serde_json::Value = serde_json::from_str(&outcome.report.to_json()).unwrap();
    assert_eq!(json["slots"].as_array().unwrap().len(), 3);
    assert_eq!(json["slots"][0]["slot"], "slot1");
    assert_eq!(json["slots"][0]["status"], "occupied");
    assert_eq!(json["slots"][0]["confidence"], 0.95);
    assert_eq!(json["slots"][1]["status"], "empty");
    assert_eq!(json["slots"][1]["confidence"], 0.0);
    assert_eq!(json["slots"][2]["status"], "occupied");
    assert_eq!(json["illegal_count"], 0);
    assert!(json["illegal_cars"].as_array().unwrap().is_empty());
}

#[test]
fn test_aisle_vehicle_becomes_illegal() {
    let mut monitor = monitor(30);
    let stationary = batch(r#"{"boxes": [[280, 280, 360, 320]]}"#).detections();

    let mut last = None;
    for cycle in 0..31 {
        let outcome = monitor.run_cycle(&stationary);
        if cycle < 30 {
            assert_eq!(outcome.report.illegal_count, 0, "cycle {cycle}");
            assert!(outcome.alerts.is_empty());
        }
        last = Some(outcome);
    }

    // 31st cycle: dwell reached 30
    let outcome = last.unwrap();
    assert_eq!(outcome.report.illegal_count, 1);
    assert_eq!(outcome.alerts.len(), 1);

    let json: serde_json::Value = serde_json::from_str(&outcome.report.to_json()).unwrap();
    let car = &json["illegal_cars"][0];
    assert_eq!(car["id"], 0);
    assert_eq!(car["duration"], 30);
    assert_eq!(car["x"], 320);
    assert_eq!(car["y"], 300);
    assert_eq!(car["msg"], "Illegal Parking");

    // Still illegal, no second alert
    let outcome = monitor.run_cycle(&stationary);
    assert_eq!(outcome.report.illegal_count, 1);
    assert!(outcome.alerts.is_empty());
}

#[test]
fn test_occlusion_resets_identity() {
    let mut monitor = monitor(3);
    let stationary = batch(r#"{"boxes": [[280, 280, 360, 320]]}"#).detections();

    for _ in 0..3 {
        monitor.run_cycle(&stationary);
    }
    // One missed frame drops the vehicle for good
    monitor.run_cycle(&[]);
    let outcome = monitor.run_cycle(&stationary);

    assert_eq!(outcome.update.created.len(), 1);
    assert_eq!(outcome.update.created[0].0, 1);
    assert_eq!(monitor.state().vehicles()[0].dwell_timer, 0);
}

#[test]
fn test_replay_with_sampling_is_deterministic() {
    let lines: String = (0..12)
        .map(|frame| {
            let x = if frame < 6 { 280 } else { 280 + frame * 10 };
            format!("{{\"frame\": {frame}, \"boxes\": [[{x}, 280, {}, 320], [30, 30, 70, 70]]}}\n", x + 80)
        })
        .collect();

    let run = || {
        let mut monitor = monitor(2);
        let mut sampler = FrameSampler::new(2);
        let mut reports = Vec::new();
        for batch in DetectionReader::new(Cursor::new(lines.clone())) {
            if sampler.admit() {
                reports.push(monitor.run_cycle(&batch.detections()).report.to_json());
            }
        }
        reports
    };

    let first = run();
    assert_eq!(first.len(), 6);
    assert_eq!(first, run());

    // Sampled lines 1, 3, 5, 7, 9, 11: parked, then a 70px jump resets dwell
    let reports: Vec<serde_json::Value> =
        first.iter().map(|r| serde_json::from_str(r).unwrap()).collect();
    let illegal: Vec<u64> = reports.iter().map(|r| r["illegal_count"].as_u64().unwrap()).collect();
    assert_eq!(illegal, vec![0, 0, 1, 0, 0, 1]);
    assert!(reports.iter().all(|r| r["slots"][0]["status"] == "occupied"));

    // Line 11 box starts at x=390
    assert_eq!(reports[2]["illegal_cars"][0]["x"], 320);
    assert_eq!(reports[5]["illegal_cars"][0]["x"], 430);
    assert_eq!(reports[5]["illegal_cars"][0]["duration"], 2);
}
