//! Global greedy nearest-neighbor association
//!
//! All (track, detection) pairs closer than the radius are sorted by distance
//! and accepted shortest-first, so a nearby passing vehicle cannot steal the
//! identity of a vehicle that is sitting still.

use crate::domain::types::Point;
use rustc_hash::FxHashSet;

/// Default association radius (pixels); pairs at or beyond it are never matched
pub const DEFAULT_MATCH_RADIUS: f64 = 100.0;

/// An accepted association
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    /// Index into the previous tracked set
    pub track_idx: usize,
    /// Index into the current aisle detections
    pub detection_idx: usize,
    /// Center-to-center distance, also the movement for dwell purposes
    pub distance: f64,
}

/// Enumerate candidate pairs strictly inside the radius
///
/// Enumeration order is track index ascending, then detection index ascending.
pub fn candidate_pairs(tracks: &[Point], detections: &[Point], radius: f64) -> Vec<Assignment> {
    let mut candidates = Vec::new();
    for (track_idx, prev) in tracks.iter().enumerate() {
        for (detection_idx, cur) in detections.iter().enumerate() {
            let distance = prev.distance(cur);
            if distance < radius {
                candidates.push(Assignment { track_idx, detection_idx, distance });
            }
        }
    }
    candidates
}

/// Accept candidate pairs shortest-first, consuming each side at most once
///
/// Returned assignments are in acceptance order. Ties in distance keep
/// enumeration order (the sort is stable).
pub fn greedy_assign(tracks: &[Point], detections: &[Point], radius: f64) -> Vec<Assignment> {
    let mut candidates = candidate_pairs(tracks, detections, radius);
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let mut used_tracks = FxHashSet::default();
    let mut used_detections = FxHashSet::default();
    let mut accepted = Vec::with_capacity(tracks.len().min(detections.len()));

    for candidate in candidates {
        if used_tracks.contains(&candidate.track_idx)
            || used_detections.contains(&candidate.detection_idx)
        {
            continue;
        }
        used_tracks.insert(candidate.track_idx);
        used_detections.insert(candidate.detection_idx);
        accepted.push(candidate);
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(i32, i32)]) -> Vec<Point> {
        raw.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn test_radius_is_exclusive() {
        let tracks = pts(&[(0, 0)]);
        assert!(greedy_assign(&tracks, &pts(&[(100, 0)]), 100.0).is_empty());
        assert_eq!(greedy_assign(&tracks, &pts(&[(99, 0)]), 100.0).len(), 1);
    }

    #[test]
    fn test_closest_pair_wins_globally() {
        // Track 0 at (0,0), track 1 at (40,0); detection 0 at (35,0).
        // Row-by-row matching would hand detection 0 to track 0 first.
        let tracks = pts(&[(0, 0), (40, 0)]);
        let dets = pts(&[(35, 0), (5, 0)]);
        let accepted = greedy_assign(&tracks, &dets, 100.0);

        assert_eq!(accepted.len(), 2);
        assert_eq!((accepted[0].track_idx, accepted[0].detection_idx), (1, 0));
        assert_eq!((accepted[1].track_idx, accepted[1].detection_idx), (0, 1));
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        // Both tracks exactly 10 away from the single detection
        let tracks = pts(&[(0, 0), (20, 0)]);
        let dets = pts(&[(10, 0)]);
        let accepted = greedy_assign(&tracks, &dets, 100.0);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].track_idx, 0);
    }

    #[test]
    fn test_each_side_consumed_once() {
        let tracks = pts(&[(0, 0)]);
        let dets = pts(&[(1, 0), (2, 0), (3, 0)]);
        let accepted = greedy_assign(&tracks, &dets, 100.0);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].detection_idx, 0);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(greedy_assign(&[], &pts(&[(1, 1)]), 100.0).is_empty());
        assert!(greedy_assign(&pts(&[(1, 1)]), &[], 100.0).is_empty());
    }
}
