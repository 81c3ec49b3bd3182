//! Zone & Portal Table - static world geometry
//!
//! Zones are axis-aligned rectangles separated by gaps; portals are fixed
//! points paired across neighbouring zones. Both are built once at startup
//! and only ever read afterwards.
//!
//! ## Layout
//! ```text
//!  common      uncommon      rare        epic       legendary
//! [0..1000]  [1500..2500]  [3000..4000] [4500..5500] [6000..7000]
//!    P1 ────────── P2  P3 ──── P4  P5 ──── P6  P7 ──── P8
//! ```

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Key of the zone every player starts in.
pub const STARTING_ZONE: &str = "common";

// ============================================================================
// Zone
// ============================================================================

/// A rectangular region with its own creature/loot profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Stable key (`"common"`, `"rare"`, ...) used by every other subsystem
    pub key: String,
    /// Display name
    pub name: String,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub color: String,
}

impl Zone {
    pub fn new(key: &str, name: &str, x: (f64, f64), y: (f64, f64), color: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            min_x: x.0,
            max_x: x.1,
            min_y: y.0,
            max_y: y.1,
            color: color.to_string(),
        }
    }

    /// Inclusive containment test (edges belong to the zone)
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn clamp(&self, p: DVec2) -> DVec2 {
        DVec2::new(
            p.x.clamp(self.min_x, self.max_x),
            p.y.clamp(self.min_y, self.max_y),
        )
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

// ============================================================================
// Portal
// ============================================================================

/// A teleport trigger; `to` names the paired portal on the other side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portal {
    pub id: String,
    pub position: DVec2,
    pub zone: String,
    pub to: String,
}

impl Portal {
    pub fn new(id: &str, x: f64, y: f64, zone: &str, to: &str) -> Self {
        Self {
            id: id.to_string(),
            position: DVec2::new(x, y),
            zone: zone.to_string(),
            to: to.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ZoneTableError {
    #[error("Duplicate zone key: {0}")]
    DuplicateZone(String),
    #[error("Portal {portal} references unknown zone {zone}")]
    UnknownZone { portal: String, zone: String },
    #[error("Portal {portal} links to unknown portal {to}")]
    DanglingLink { portal: String, to: String },
    #[error("Portal link {from} -> {to} is not symmetric")]
    AsymmetricLink { from: String, to: String },
    #[error("Portal {0} lies outside its zone")]
    PortalOutsideZone(String),
}

// ============================================================================
// Zone Table
// ============================================================================

/// Immutable lookup over zones and the portal graph
#[derive(Debug, Clone)]
pub struct ZoneTable {
    zones: Vec<Zone>,
    portals: BTreeMap<String, Portal>,
}

impl ZoneTable {
    /// Build and validate a table. Links must be symmetric (A→B ⇒ B→A) and
    /// every portal must sit inside the zone it claims.
    pub fn new(zones: Vec<Zone>, portals: Vec<Portal>) -> Result<Self, ZoneTableError> {
        let table = Self::from_parts(zones, portals);
        table.validate()?;
        Ok(table)
    }

    fn from_parts(zones: Vec<Zone>, portals: Vec<Portal>) -> Self {
        let portals = portals.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self { zones, portals }
    }

    /// Check zone keys are unique and the portal graph is well formed
    pub fn validate(&self) -> Result<(), ZoneTableError> {
        let zones = &self.zones;
        for (i, zone) in zones.iter().enumerate() {
            if zones[..i].iter().any(|z| z.key == zone.key) {
                return Err(ZoneTableError::DuplicateZone(zone.key.clone()));
            }
        }

        for portal in self.portals.values() {
            let zone = zones.iter().find(|z| z.key == portal.zone).ok_or_else(|| {
                ZoneTableError::UnknownZone {
                    portal: portal.id.clone(),
                    zone: portal.zone.clone(),
                }
            })?;
            if !zone.contains(portal.position) {
                return Err(ZoneTableError::PortalOutsideZone(portal.id.clone()));
            }
            let peer = self
                .portals
                .get(&portal.to)
                .ok_or_else(|| ZoneTableError::DanglingLink {
                    portal: portal.id.clone(),
                    to: portal.to.clone(),
                })?;
            if peer.to != portal.id {
                return Err(ZoneTableError::AsymmetricLink {
                    from: portal.id.clone(),
                    to: portal.to.clone(),
                });
            }
        }
        Ok(())
    }

    /// The five-zone arena with its four portal pairs. Built without
    /// checks; callers that load it at startup run [`ZoneTable::validate`].
    pub fn standard() -> Self {
        let zones = vec![
            Zone::new("common", "Common Zone", (0.0, 1000.0), (0.0, 1000.0), "#666666"),
            Zone::new("uncommon", "Uncommon Zone", (1500.0, 2500.0), (0.0, 1000.0), "#00FF00"),
            Zone::new("rare", "Rare Zone", (3000.0, 4000.0), (0.0, 1000.0), "#0088FF"),
            Zone::new("epic", "Epic Zone", (4500.0, 5500.0), (0.0, 1000.0), "#FF00FF"),
            Zone::new("legendary", "Legendary Zone", (6000.0, 7000.0), (0.0, 1000.0), "#FFAA00"),
        ];
        let portals = vec![
            Portal::new("P1", 800.0, 500.0, "common", "P2"),
            Portal::new("P2", 1700.0, 500.0, "uncommon", "P1"),
            Portal::new("P3", 2300.0, 500.0, "uncommon", "P4"),
            Portal::new("P4", 3200.0, 500.0, "rare", "P3"),
            Portal::new("P5", 3800.0, 500.0, "rare", "P6"),
            Portal::new("P6", 4700.0, 500.0, "epic", "P5"),
            Portal::new("P7", 5300.0, 500.0, "epic", "P8"),
            Portal::new("P8", 6200.0, 500.0, "legendary", "P7"),
        ];
        Self::from_parts(zones, portals)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, key: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.key == key)
    }

    /// Zone whose rectangle contains the point, or `None` in a gap
    pub fn zone_containing(&self, p: DVec2) -> Option<&Zone> {
        self.zones.iter().find(|z| z.contains(p))
    }

    /// Zone with the closest rectangle center
    pub fn nearest_zone(&self, p: DVec2) -> Option<&Zone> {
        self.zones.iter().min_by(|a, b| {
            let da = a.center().distance_squared(p);
            let db = b.center().distance_squared(p);
            da.total_cmp(&db)
        })
    }

    pub fn portal(&self, id: &str) -> Option<&Portal> {
        self.portals.get(id)
    }

    /// Portals in id order
    pub fn portals(&self) -> impl Iterator<Item = &Portal> {
        self.portals.values()
    }

    /// The paired destination of a portal
    pub fn destination(&self, portal: &Portal) -> Option<&Portal> {
        self.portals.get(&portal.to)
    }

    /// Bounding box of all zones (the world dimensions sent to clients)
    pub fn world_size(&self) -> (f64, f64) {
        let width = self.zones.iter().map(|z| z.max_x).fold(0.0, f64::max);
        let height = self.zones.iter().map(|z| z.max_y).fold(0.0, f64::max);
        (width, height)
    }
}

impl Default for ZoneTable {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// Tests
// ============================================================================
