//! Region filtering and parking slot occupancy
//!
//! Each cycle:
//! 1. Drop detections whose center lies outside the monitor zone
//! 2. Credit each remaining detection to the lowest-indexed slot containing it
//! 3. Everything not in a slot becomes the aisle set for the tracker
//!
//! The snapshot is recomputed from scratch every cycle.

use crate::domain::types::Detection;
use crate::infra::regions::Regions;
use crate::services::geometry::Polygon;

/// Per-cycle occupancy flags, one per parking slot (index order)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OccupancySnapshot {
    occupied: Vec<bool>,
}

impl OccupancySnapshot {
    pub fn empty(slot_count: usize) -> Self {
        Self { occupied: vec![false; slot_count] }
    }

    #[inline]
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.occupied.get(slot).copied().unwrap_or(false)
    }

    pub fn flags(&self) -> &[bool] {
        &self.occupied
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.iter().filter(|&&o| o).count()
    }

    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }
}

/// Result of splitting a cycle's detections
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub snapshot: OccupancySnapshot,
    /// Detections inside the monitor zone but in no slot, in input order
    pub aisle: Vec<Detection>,
    /// Detections dropped by the monitor zone filter
    pub outside_zone: usize,
}

/// Keep only detections whose center lies in the monitor zone
pub fn filter_monitor_zone(zone: &Polygon, detections: &[Detection]) -> Vec<Detection> {
    detections.iter().filter(|d| zone.contains(d.center)).copied().collect()
}

/// Index of the first slot containing the detection's center, if any
#[inline]
pub fn slot_for(slots: &[Polygon], detection: &Detection) -> Option<usize> {
    slots.iter().position(|slot| slot.contains(detection.center))
}

/// Split zone-filtered detections into slot occupancy and the aisle set
pub fn classify_slots(slots: &[Polygon], detections: &[Detection]) -> (OccupancySnapshot, Vec<Detection>) {
    let mut snapshot = OccupancySnapshot::empty(slots.len());
    let mut aisle = Vec::with_capacity(detections.len());

    for detection in detections {
        match slot_for(slots, detection) {
            Some(idx) => snapshot.occupied[idx] = true,
            None => aisle.push(*detection),
        }
    }

    (snapshot, aisle)
}

/// Full region pass: monitor zone filter followed by slot classification
pub fn classify(regions: &Regions, detections: &[Detection]) -> Classification {
    let in_zone = filter_monitor_zone(regions.monitor_zone(), detections);
    let outside_zone = detections.len() - in_zone.len();
    let (snapshot, aisle) = classify_slots(regions.slots(), &in_zone);
    Classification { snapshot, aisle, outside_zone }
}
