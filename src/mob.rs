//! Mob definitions - archetypes, rarity tiers and rolled stats
//!
//! ## Generation
//! ```text
//! Zone key ──► weighted rarity roll ──┐
//!                                     ├──► MobBlueprint ──► Mob (placed in zone)
//! Archetype base stats ───────────────┘    (stats × tier multipliers, radius ±5)
//! ```
//!
//! Behaviour state machines live in [`crate::mob_ai`]; this module only
//! holds data and the per-mob primitives the AI and combat code build on.

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::time::Instant;

use crate::petal::PetalType;
use crate::world::{Killer, MobId};
use crate::zones::Zone;

/// A mob stops steering once it is this close to its target
pub const ARRIVAL_DISTANCE: f64 = 5.0;

// ============================================================================
// Archetypes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobType {
    Goblin,
    Orc,
    Wolf,
}

/// How an archetype reacts to a nearby player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temperament {
    Timid,
    Aggressive,
    Neutral,
}

/// Unscaled archetype stats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseStats {
    pub health: i32,
    pub damage: i32,
    pub speed: f64,
    pub radius: f64,
    pub detection_range: f64,
}

impl MobType {
    pub const ALL: [MobType; 3] = [MobType::Goblin, MobType::Orc, MobType::Wolf];

    pub fn base_stats(&self) -> BaseStats {
        match self {
            MobType::Goblin => BaseStats {
                health: 30,
                damage: 8,
                speed: 10.0,
                radius: 7.0,
                detection_range: 500.0,
            },
            MobType::Orc => BaseStats {
                health: 80,
                damage: 15,
                speed: 20.0,
                radius: 25.0,
                detection_range: 500.0,
            },
            MobType::Wolf => BaseStats {
                health: 40,
                damage: 10,
                speed: 15.0,
                radius: 12.0,
                detection_range: 500.0,
            },
        }
    }

    pub fn temperament(&self) -> Temperament {
        match self {
            MobType::Goblin => Temperament::Timid,
            MobType::Orc => Temperament::Aggressive,
            MobType::Wolf => Temperament::Neutral,
        }
    }

    /// Petal type dropped when this archetype dies
    pub fn loot(&self) -> PetalType {
        match self {
            MobType::Goblin => PetalType::Goblin,
            MobType::Orc => PetalType::Orc,
            MobType::Wolf => PetalType::Wolf,
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

// ============================================================================
// Rarity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Stat multipliers applied on top of archetype base stats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RarityMultipliers {
    pub health: f64,
    pub damage: f64,
    pub radius: f64,
    pub speed: f64,
}

impl Rarity {
    pub fn multipliers(&self) -> RarityMultipliers {
        let (health, damage, radius, speed) = match self {
            Rarity::Common => (1.0, 1.0, 1.0, 1.0),
            Rarity::Uncommon => (1.4, 1.3, 1.4, 1.1),
            Rarity::Rare => (1.8, 1.6, 1.8, 1.2),
            Rarity::Epic => (2.25, 2.0, 2.25, 1.3),
            // Three times an epic
            Rarity::Legendary => (6.75, 6.0, 6.75, 1.5),
        };
        RarityMultipliers { health, damage, radius, speed }
    }

    /// Weighted rarity table for a zone, in tier order
    pub fn zone_table(zone: &str) -> Option<&'static [(Rarity, f64)]> {
        let table: &'static [(Rarity, f64)] = match zone {
            "common" => &[(Rarity::Common, 0.8), (Rarity::Uncommon, 0.2)],
            "uncommon" => &[
                (Rarity::Common, 0.5),
                (Rarity::Uncommon, 0.4),
                (Rarity::Rare, 0.1),
            ],
            "rare" => &[
                (Rarity::Common, 0.2),
                (Rarity::Uncommon, 0.6),
                (Rarity::Rare, 0.18),
                (Rarity::Epic, 0.02),
            ],
            "epic" => &[
                (Rarity::Common, 0.05),
                (Rarity::Uncommon, 0.5),
                (Rarity::Rare, 0.4),
                (Rarity::Epic, 0.05),
            ],
            "legendary" => &[(Rarity::Common, 0.99), (Rarity::Legendary, 0.01)],
            _ => return None,
        };
        Some(table)
    }

    /// Roll a rarity for a zone. Unknown zones and rounding gaps fall back to common.
    pub fn roll<R: Rng + ?Sized>(zone: &str, rng: &mut R) -> Self {
        let Some(table) = Self::zone_table(zone) else {
            return Rarity::Common;
        };
        let r: f64 = rng.gen();
        let mut cumulative = 0.0;
        for &(rarity, weight) in table {
            cumulative += weight;
            if r <= cumulative {
                return rarity;
            }
        }
        Rarity::Common
    }
}

// ============================================================================
// Blueprint
// ============================================================================

/// Rolled stats for a mob that has not been placed yet
#[derive(Debug, Clone, PartialEq)]
pub struct MobBlueprint {
    pub kind: MobType,
    pub rarity: Rarity,
    pub health: i32,
    pub damage: i32,
    pub speed: f64,
    pub radius: f64,
    pub detection_range: f64,
}

impl MobBlueprint {
    /// Roll rarity for `zone` and derive stats with radius jitter
    pub fn roll<R: Rng + ?Sized>(kind: MobType, zone: &str, rng: &mut R) -> Self {
        let rarity = Rarity::roll(zone, rng);
        let jitter = rng.gen_range(-5.0..5.0);
        Self::with_rarity(kind, rarity, jitter)
    }

    /// Deterministic stats for a known rarity and radius offset
    pub fn with_rarity(kind: MobType, rarity: Rarity, radius_jitter: f64) -> Self {
        let base = kind.base_stats();
        let mult = rarity.multipliers();
        Self {
            kind,
            rarity,
            health: (f64::from(base.health) * mult.health) as i32,
            damage: (f64::from(base.damage) * mult.damage) as i32,
            speed: base.speed * mult.speed,
            radius: (base.radius * mult.radius + radius_jitter).max(2.0),
            detection_range: base.detection_range,
        }
    }
}

// ============================================================================
// Mob
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobState {
    Wandering,
    Chasing,
    Attacking,
    Fleeing,
}

#[derive(Debug, Clone)]
pub struct Mob {
    pub id: MobId,
    pub kind: MobType,
    pub rarity: Rarity,
    pub health: i32,
    pub max_health: i32,
    pub damage: i32,
    pub speed: f64,
    pub radius: f64,
    pub zone: String,
    pub position: DVec2,
    pub detection_range: f64,

    // Behaviour
    pub target: Option<DVec2>,
    pub state: MobState,
    /// When the current target was chosen
    pub last_retarget: Instant,
    /// Earliest time the next lunge may start
    pub attack_ready_at: Instant,
    /// Last time this mob dealt contact damage
    pub last_hit: Instant,
    pub spawned_at: Instant,
    /// Whoever landed the most recent hit
    pub last_hit_by: Option<Killer>,
}

impl Mob {
    pub fn from_blueprint(
        id: MobId,
        blueprint: &MobBlueprint,
        zone: &str,
        position: DVec2,
        now: Instant,
    ) -> Self {
        Self {
            id,
            kind: blueprint.kind,
            rarity: blueprint.rarity,
            health: blueprint.health,
            max_health: blueprint.health,
            damage: blueprint.damage,
            speed: blueprint.speed,
            radius: blueprint.radius,
            zone: zone.to_string(),
            position,
            detection_range: blueprint.detection_range,
            target: None,
            state: MobState::Wandering,
            last_retarget: now,
            attack_ready_at: now,
            last_hit: now,
            spawned_at: now,
            last_hit_by: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn distance_to(&self, p: DVec2) -> f64 {
        self.position.distance(p)
    }

    /// Apply damage, clamping health at zero. Returns true on the killing blow.
    pub fn take_damage(&mut self, amount: i32, attacker: Killer) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.health = (self.health - amount).max(0);
        self.last_hit_by = Some(attacker);
        !self.is_alive()
    }

    /// Pick a point 50–150 units away in a uniform direction
    pub fn set_random_target<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Instant) {
        let angle = rng.gen_range(0.0..TAU);
        let distance = rng.gen_range(50.0..150.0);
        let candidate = self.position + DVec2::from_angle(angle) * distance;

        let offset = candidate - self.position;
        if offset.x.abs() > 10.0 || offset.y.abs() > 10.0 {
            self.target = Some(candidate);
            self.last_retarget = now;
        }
    }

    /// Steer toward the target at current speed and stay inside the zone
    pub fn step_toward_target(&mut self, zone: &Zone) {
        let Some(target) = self.target.filter(|t| *t != DVec2::ZERO) else {
            return;
        };
        let offset = target - self.position;
        let distance = offset.length();
        if distance > ARRIVAL_DISTANCE {
            self.position += offset / distance * self.speed;
        }
        self.position = zone.clamp(self.position);
    }
}
