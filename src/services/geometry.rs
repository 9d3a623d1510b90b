//! Point-in-polygon membership for monitor zone and parking slots
//!
//! Integer crossing-number test. Boundary points (edges and vertices) count
//! as inside. Polygons with fewer than 3 vertices never contain anything.

use crate::domain::types::Point;
use smallvec::SmallVec;

/// Simple polygon, closed implicitly (last vertex connects back to first)
///
/// Parking slots are quadrilaterals, so most polygons stay inline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Polygon {
    vertices: SmallVec<[Point; 8]>,
}

impl Polygon {
    pub fn new(vertices: impl IntoIterator<Item = Point>) -> Self {
        Self { vertices: vertices.into_iter().collect() }
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Fewer than 3 vertices
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }

    /// Membership test, boundary inclusive
    #[inline]
    pub fn contains(&self, point: Point) -> bool {
        contains(&self.vertices, point)
    }
}

impl From<Vec<[i32; 2]>> for Polygon {
    fn from(points: Vec<[i32; 2]>) -> Self {
        Self::new(points.into_iter().map(Point::from))
    }
}

/// Test whether `point` lies inside or on the boundary of the polygon
pub fn contains(vertices: &[Point], point: Point) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let px = i64::from(point.x);
    let py = i64::from(point.y);
    let mut inside = false;

    for (i, a) in vertices.iter().enumerate() {
        let b = &vertices[(i + 1) % vertices.len()];
        let (ax, ay) = (i64::from(a.x), i64::from(a.y));
        let (bx, by) = (i64::from(b.x), i64::from(b.y));

        if on_segment(ax, ay, bx, by, px, py) {
            return true;
        }

        // Half-open rule on y so shared vertices are counted once
        if (ay > py) != (by > py) {
            // px < x-intercept, cross-multiplied to stay in integers
            let lhs = (px - ax) * (by - ay);
            let rhs = (bx - ax) * (py - ay);
            let crosses = if by > ay { lhs < rhs } else { lhs > rhs };
            if crosses {
                inside = !inside;
            }
        }
    }

    inside
}

#[inline]
fn on_segment(ax: i64, ay: i64, bx: i64, by: i64, px: i64, py: i64) -> bool {
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    cross == 0
        && px >= ax.min(bx)
        && px <= ax.max(bx)
        && py >= ay.min(by)
        && py <= ay.max(by)
}
