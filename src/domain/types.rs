//! Shared types for the parking monitor

use serde::{Deserialize, Serialize};

/// Newtype wrapper for tracked vehicle IDs
///
/// Allocated from a per-run monotonic counter, never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VehicleId(pub u64);

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer image-space point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dy = f64::from(other.y) - f64::from(self.y);
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[i32; 2]> for Point {
    fn from(p: [i32; 2]) -> Self {
        Self { x: p[0], y: p[1] }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned bounding box in integer pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    #[inline]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Convert a raw detector box, truncating fractional coordinates toward zero
    pub fn from_raw(raw: [f64; 4]) -> Self {
        Self::new(raw[0] as i32, raw[1] as i32, raw[2] as i32, raw[3] as i32)
    }

    /// Box midpoint using floor division (identical to truncation for image coordinates)
    ///
    /// Summed in `i64`: saturated wire coordinates must not overflow.
    #[inline]
    pub fn center(&self) -> Point {
        Point::new(midpoint(self.x1, self.x2), midpoint(self.y1, self.y2))
    }
}

#[inline]
fn midpoint(a: i32, b: i32) -> i32 {
    // Floor of the mean of two i32 values always fits in i32
    (i64::from(a) + i64::from(b)).div_euclid(2) as i32
}

/// One detector box for the current cycle, with its derived center
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub center: Point,
}

impl Detection {
    #[inline]
    pub fn new(bbox: BoundingBox) -> Self {
        Self { bbox, center: bbox.center() }
    }

    /// Convenience constructor from corner coordinates
    #[inline]
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(BoundingBox::new(x1, y1, x2, y2))
    }
}

/// Detector output for one frame as it arrives on the wire
///
/// `{"frame": 120, "boxes": [[x1, y1, x2, y2], ...]}`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DetectionBatch {
    /// Optional frame number assigned by the detector
    #[serde(default)]
    pub frame: Option<u64>,
    /// Raw boxes, possibly with fractional coordinates
    #[serde(default)]
    pub boxes: Vec<[f64; 4]>,
}

impl DetectionBatch {
    /// Convert raw boxes into detections for a cycle
    pub fn detections(&self) -> Vec<Detection> {
        self.boxes.iter().map(|raw| Detection::new(BoundingBox::from_raw(*raw))).collect()
    }
}

/// Persistent record of an aisle vehicle across cycles
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedVehicle {
    pub id: VehicleId,
    pub center: Point,
    pub bbox: BoundingBox,
    /// Consecutive stationary cycles
    pub dwell_timer: u32,
    /// One-way latch, set when the illegal-parking alert fires
    pub alerted: bool,
}

impl TrackedVehicle {
    #[inline]
    pub fn new(id: VehicleId, detection: &Detection) -> Self {
        Self { id, center: detection.center, bbox: detection.bbox, dwell_timer: 0, alerted: false }
    }
}
