//! Region loading: monitor zone and parking slot polygons
//!
//! Slots come from a JSON file holding a list of point lists, one per slot,
//! in the format written by the slot authoring tool:
//!
//! ```json
//! [[[10, 20], [110, 20], [110, 90], [10, 90]], ...]
//! ```
//!
//! The monitor zone is either inline in the TOML config or a JSON file with a
//! single point list. Regions are loaded once and never change during a run.

use crate::infra::config::Config;
use crate::services::geometry::Polygon;
use anyhow::{bail, Context};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Polygon as stored on disk: a list of `[x, y]` points
pub type RawPolygon = Vec<[i32; 2]>;

/// Immutable region set for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regions {
    monitor_zone: Polygon,
    slots: Vec<Polygon>,
}

impl Regions {
    pub fn new(monitor_zone: Polygon, slots: Vec<Polygon>) -> Self {
        Self { monitor_zone, slots }
    }

    /// Load regions as configured; any failure here is fatal for startup
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let monitor_zone = match (config.monitor_zone(), config.monitor_zone_file()) {
            (Some(points), _) => Polygon::from(points.to_vec()),
            (None, Some(path)) => Polygon::from(read_polygon_file(path)?),
            (None, None) => bail!("No monitor zone configured (regions.monitor_zone or regions.monitor_zone_file)"),
        };

        let slots_file = config
            .slots_file()
            .context("No parking slot file configured (regions.slots_file)")?;
        let slots = read_slots_file(slots_file)?;

        let regions = Self::from_parts(monitor_zone, slots)?;
        info!(
            slots = %regions.slot_count(),
            monitor_zone_vertices = %regions.monitor_zone.vertices().len(),
            slots_file = %slots_file,
            "regions_loaded"
        );
        Ok(regions)
    }

    /// Validate and assemble regions from raw polygons
    ///
    /// A degenerate monitor zone would reject every detection, so it is an error.
    /// Degenerate slots are kept (they are simply never occupied) but logged.
    pub fn from_parts(monitor_zone: Polygon, slots: Vec<RawPolygon>) -> anyhow::Result<Self> {
        if monitor_zone.is_degenerate() {
            bail!(
                "Monitor zone needs at least 3 vertices, got {}",
                monitor_zone.vertices().len()
            );
        }

        let slots: Vec<Polygon> = slots.into_iter().map(Polygon::from).collect();
        for (idx, slot) in slots.iter().enumerate() {
            if slot.is_degenerate() {
                warn!(
                    slot = %format!("slot{}", idx + 1),
                    vertices = %slot.vertices().len(),
                    "degenerate_slot_polygon"
                );
            }
        }

        Ok(Self { monitor_zone, slots })
    }

    pub fn monitor_zone(&self) -> &Polygon {
        &self.monitor_zone
    }

    pub fn slots(&self) -> &[Polygon] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

/// Parse a slots JSON document (list of point lists)
pub fn parse_slots(json: &str) -> anyhow::Result<Vec<RawPolygon>> {
    serde_json::from_str(json).context("Slot data must be a list of [[x, y], ...] point lists")
}

fn read_slots_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<RawPolygon>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read slots file {}", path.display()))?;
    parse_slots(&content).with_context(|| format!("Failed to parse slots file {}", path.display()))
}

fn read_polygon_file<P: AsRef<Path>>(path: P) -> anyhow::Result<RawPolygon> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read monitor zone file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse monitor zone file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Point;

    fn zone() -> Polygon {
        Polygon::from(vec![[0, 0], [640, 0], [640, 480], [0, 480]])
    }

    #[test]
    fn test_parse_slots() {
        let slots = parse_slots("[[[0,0],[10,0],[10,10],[0,10]], [[20,0],[30,0],[30,10]]]").unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].len(), 3);
    }

    #[test]
    fn test_parse_slots_rejects_malformed() {
        assert!(parse_slots("{\"slots\": 1}").is_err());
        assert!(parse_slots("[[[0, 0, 0]]]").is_err());
        assert!(parse_slots("not json").is_err());
    }

    #[test]
    fn test_from_parts_keeps_slot_order() {
        let regions =
            Regions::from_parts(zone(), vec![vec![[0, 0], [5, 0], [5, 5]], vec![[1, 1], [2, 2]]])
                .unwrap();
        assert_eq!(regions.slot_count(), 2);
        assert!(!regions.slots()[0].is_degenerate());
        assert!(regions.slots()[1].is_degenerate());
        assert!(regions.monitor_zone().contains(Point::new(320, 240)));
    }

    #[test]
    fn test_degenerate_monitor_zone_is_error() {
        let zone = Polygon::from(vec![[0, 0], [10, 10]]);
        assert!(Regions::from_parts(zone, vec![]).is_err());
    }
}
