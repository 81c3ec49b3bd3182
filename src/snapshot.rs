//! Snapshots - serializable views of world state for clients
//!
//! ```text
//! World (write-locked by ticks)
//!       │  read lock, copy out
//!       ▼
//! Vec<Frame> ── lock released ──► per-connection queues
//! ```
//!
//! Each player only sees its own zone: the players standing there (with
//! their petals), live mobs and drops.

use serde::Serialize;
use std::collections::HashMap;

use crate::mob::{Mob, MobState, MobType, Rarity};
use crate::petal::{Petal, PetalDrop, PetalType};
use crate::player::Player;
use crate::world::{DropId, MobId, Outbound, PetalId, PlayerId, World};
use crate::zones::Zone;

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PetalView {
    pub id: PetalId,
    #[serde(rename = "type")]
    pub kind: PetalType,
    pub x: f64,
    pub y: f64,
    pub health: i32,
    pub max_health: i32,
    pub active: bool,
    pub orbit_radius: f64,
}

impl From<&Petal> for PetalView {
    fn from(petal: &Petal) -> Self {
        Self {
            id: petal.id,
            kind: petal.kind,
            x: petal.position.x,
            y: petal.position.y,
            health: petal.health,
            max_health: petal.max_health,
            active: petal.active,
            orbit_radius: petal.orbit_radius,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub username: String,
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub radius: f64,
    pub health: i32,
    pub max_health: i32,
    pub zone: String,
    pub alive: bool,
    pub petals: Vec<PetalView>,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            username: player.username.clone(),
            x: player.position.x,
            y: player.position.y,
            color: player.color.clone(),
            radius: player.radius,
            health: player.health,
            max_health: player.max_health,
            zone: player.current_zone.clone(),
            alive: player.is_alive(),
            petals: player.petals.values().map(PetalView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MobView {
    pub id: MobId,
    #[serde(rename = "type")]
    pub kind: MobType,
    pub rarity: Rarity,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub health: i32,
    pub max_health: i32,
    pub state: MobState,
}

impl From<&Mob> for MobView {
    fn from(mob: &Mob) -> Self {
        Self {
            id: mob.id,
            kind: mob.kind,
            rarity: mob.rarity,
            x: mob.position.x,
            y: mob.position.y,
            radius: mob.radius,
            health: mob.health,
            max_health: mob.max_health,
            state: mob.state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DropView {
    pub id: DropId,
    #[serde(rename = "type")]
    pub kind: PetalType,
    pub x: f64,
    pub y: f64,
    pub owner_id: PlayerId,
    pub zone: String,
}

impl From<&PetalDrop> for DropView {
    fn from(drop: &PetalDrop) -> Self {
        Self {
            id: drop.id,
            kind: drop.kind,
            x: drop.position.x,
            y: drop.position.y,
            owner_id: drop.owner_id,
            zone: drop.zone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneView {
    pub key: String,
    pub name: String,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub color: String,
}

impl From<&Zone> for ZoneView {
    fn from(zone: &Zone) -> Self {
        Self {
            key: zone.key.clone(),
            name: zone.name.clone(),
            min_x: zone.min_x,
            max_x: zone.max_x,
            min_y: zone.min_y,
            max_y: zone.max_y,
            color: zone.color.clone(),
        }
    }
}

/// Everything one client is shown in a `state` frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub your_id: PlayerId,
    pub your_zone: String,
    pub world_width: f64,
    pub world_height: f64,
    pub zone: Option<ZoneView>,
    pub players: Vec<PlayerView>,
    pub mobs: Vec<MobView>,
    pub drops: Vec<DropView>,
}

/// A snapshot ready to be queued on a player's connection
pub struct Frame {
    pub player_id: PlayerId,
    pub outbound: Outbound,
    pub snapshot: StateSnapshot,
}

/// Shared per-zone contents, built once per broadcast
#[derive(Default)]
struct ZoneContents {
    zone: Option<ZoneView>,
    players: Vec<PlayerView>,
    mobs: Vec<MobView>,
    drops: Vec<DropView>,
}

// ============================================================================
// Builders
// ============================================================================

impl World {
    fn zone_contents(&self) -> HashMap<&str, ZoneContents> {
        let mut by_zone: HashMap<&str, ZoneContents> = HashMap::new();
        for zone in self.zones.zones() {
            by_zone.entry(zone.key.as_str()).or_default().zone = Some(ZoneView::from(zone));
        }
        for player in self.players.values() {
            by_zone
                .entry(player.current_zone.as_str())
                .or_default()
                .players
                .push(PlayerView::from(player));
        }
        for mob in self.mobs.values().filter(|m| m.is_alive()) {
            by_zone
                .entry(mob.zone.as_str())
                .or_default()
                .mobs
                .push(MobView::from(mob));
        }
        for drop in self.drops.values() {
            by_zone
                .entry(drop.zone.as_str())
                .or_default()
                .drops
                .push(DropView::from(drop));
        }
        by_zone
    }

    fn snapshot_from(&self, player: &Player, contents: Option<&ZoneContents>) -> StateSnapshot {
        let (world_width, world_height) = self.zones.world_size();
        StateSnapshot {
            your_id: player.id,
            your_zone: player.current_zone.clone(),
            world_width,
            world_height,
            zone: contents.and_then(|c| c.zone.clone()),
            players: contents.map(|c| c.players.clone()).unwrap_or_default(),
            mobs: contents.map(|c| c.mobs.clone()).unwrap_or_default(),
            drops: contents.map(|c| c.drops.clone()).unwrap_or_default(),
        }
    }

    /// Zone-filtered snapshot for a single player
    pub fn snapshot_for(&self, id: PlayerId) -> Option<StateSnapshot> {
        let player = self.players.get(&id)?;
        let contents = self.zone_contents();
        Some(self.snapshot_from(player, contents.get(player.current_zone.as_str())))
    }

    /// Snapshots for every connected player. Call under a read lock and
    /// release it before queueing.
    pub fn collect_frames(&self) -> Vec<Frame> {
        let contents = self.zone_contents();
        self.players
            .values()
            .filter_map(|player| {
                let outbound = self.connection(player.id)?.clone();
                let snapshot =
                    self.snapshot_from(player, contents.get(player.current_zone.as_str()));
                Some(Frame { player_id: player.id, outbound, snapshot })
            })
            .collect()
    }
}
