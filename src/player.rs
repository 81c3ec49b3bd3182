use glam::DVec2;
use rand::Rng;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::config::WorldConfig;
use crate::petal::Petal;
use crate::world::{PetalId, PlayerId};

/// Colors handed out to joining players
pub const PLAYER_COLORS: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98FB98", "#FFD700",
];

pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    PLAYER_COLORS[rng.gen_range(0..PLAYER_COLORS.len())]
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    /// Account id supplied by the auth collaborator
    pub user_id: String,
    pub username: String,
    pub position: DVec2,
    pub color: String,
    pub speed: f64,
    pub radius: f64,
    pub health: i32,
    pub max_health: i32,
    pub collision_damage: i32,
    pub current_zone: String,
    pub portal_ready_at: Option<Instant>,
    /// Last time this player dealt contact damage
    pub last_hit: Option<Instant>,
    pub petals: BTreeMap<PetalId, Petal>,
}

impl Player {
    pub fn new(
        id: PlayerId,
        user_id: &str,
        username: &str,
        position: DVec2,
        zone: &str,
        color: &str,
        config: &WorldConfig,
    ) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            username: username.to_string(),
            position,
            color: color.to_string(),
            speed: config.player_speed,
            radius: config.player_radius,
            health: config.player_max_health,
            max_health: config.player_max_health,
            collision_damage: config.player_collision_damage,
            current_zone: zone.to_string(),
            portal_ready_at: None,
            last_hit: None,
            petals: BTreeMap::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Apply damage, clamped at zero. Returns true if this hit killed the player.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.health = (self.health - amount).max(0);
        !self.is_alive()
    }

    /// Restore up to `amount` health. Returns the amount actually healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.health;
        self.health = (self.health + amount).min(self.max_health);
        self.health - before
    }

    pub fn can_hit(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_hit
            .map_or(true, |t| now.saturating_duration_since(t) >= cooldown)
    }

    pub fn portal_ready(&self, now: Instant) -> bool {
        self.portal_ready_at.map_or(true, |t| now >= t)
    }

    /// Back to full health at a new spawn point; petals were stripped on death
    pub fn respawn_at(&mut self, position: DVec2, zone: &str) {
        self.position = position;
        self.current_zone = zone.to_string();
        self.health = self.max_health;
        self.last_hit = None;
        self.portal_ready_at = None;
    }
}
