//! Petals (orbiting companions) and the drops they are picked up from

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use crate::world::{DropId, PetalId, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetalType {
    Wolf,
    Goblin,
    Orc,
}

/// Fixed per-type petal stats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PetalStats {
    pub health: i32,
    pub damage: i32,
    pub heal_amount: i32,
    /// Seconds between heals; zero for non-healers
    pub heal_rate: f64,
    pub orbit_radius: f64,
    /// Radians per second
    pub orbit_speed: f64,
}

impl PetalType {
    pub fn stats(&self) -> PetalStats {
        match self {
            // Healer: no damage, restores owner health
            PetalType::Wolf => PetalStats {
                health: 50,
                damage: 0,
                heal_amount: 5,
                heal_rate: 2.0,
                orbit_radius: 60.0,
                orbit_speed: 1.5,
            },
            PetalType::Goblin => PetalStats {
                health: 15,
                damage: 20,
                heal_amount: 0,
                heal_rate: 0.0,
                orbit_radius: 50.0,
                orbit_speed: 2.0,
            },
            PetalType::Orc => PetalStats {
                health: 20,
                damage: 12,
                heal_amount: 0,
                heal_rate: 0.0,
                orbit_radius: 70.0,
                orbit_speed: 1.2,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Petal {
    pub id: PetalId,
    pub kind: PetalType,
    pub owner_id: PlayerId,
    pub health: i32,
    pub max_health: i32,
    pub damage: i32,
    pub heal_amount: i32,
    pub heal_rate: Duration,
    pub orbit_radius: f64,
    pub angle: f64,
    pub orbit_speed: f64,
    pub active: bool,
    pub last_heal: Instant,
    pub last_attack: Instant,
    pub position: DVec2,
}

impl Petal {
    /// New active petal at angle zero around `owner_position`
    pub fn new(
        id: PetalId,
        kind: PetalType,
        owner_id: PlayerId,
        owner_position: DVec2,
        now: Instant,
    ) -> Self {
        let stats = kind.stats();
        Self {
            id,
            kind,
            owner_id,
            health: stats.health,
            max_health: stats.health,
            damage: stats.damage,
            heal_amount: stats.heal_amount,
            heal_rate: Duration::from_secs_f64(stats.heal_rate),
            orbit_radius: stats.orbit_radius,
            angle: 0.0,
            orbit_speed: stats.orbit_speed,
            active: true,
            last_heal: now,
            last_attack: now,
            position: owner_position + DVec2::new(stats.orbit_radius, 0.0),
        }
    }

    /// Advance the orbit by `dt` seconds and recompute position around the owner
    pub fn advance_orbit(&mut self, owner_position: DVec2, dt: f64) -> DVec2 {
        self.angle = (self.angle + self.orbit_speed * dt).rem_euclid(TAU);
        self.position = owner_position + DVec2::from_angle(self.angle) * self.orbit_radius;
        self.position
    }

    pub fn can_heal(&self, now: Instant) -> bool {
        self.active
            && self.heal_amount > 0
            && now.saturating_duration_since(self.last_heal) >= self.heal_rate
    }

    pub fn can_attack(&self, now: Instant, cooldown: Duration) -> bool {
        self.active
            && self.damage > 0
            && now.saturating_duration_since(self.last_attack) >= cooldown
    }

    /// Apply damage. Returns true when this hit knocked the petal out.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if !self.active {
            return false;
        }
        self.health -= amount;
        if self.health <= 0 {
            self.health = 0;
            self.active = false;
            return true;
        }
        false
    }

    pub fn revive(&mut self) {
        self.health = self.max_health;
        self.active = true;
    }
}

/// Loot left where a mob died; only its owner may pick it up
#[derive(Debug, Clone, PartialEq)]
pub struct PetalDrop {
    pub id: DropId,
    pub kind: PetalType,
    pub position: DVec2,
    pub owner_id: PlayerId,
    pub zone: String,
    pub created_at: Instant,
    pub lifetime: Duration,
}

impl PetalDrop {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.lifetime
    }

    pub fn can_be_picked_by(&self, player_id: PlayerId) -> bool {
        self.owner_id == player_id
    }
}
