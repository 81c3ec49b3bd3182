//! Server configuration
//!
//! Resolution order: built-in defaults, then an optional JSON file named by
//! `ARENA_CONFIG`, then individual environment overrides (`ARENA_HOST`,
//! `ARENA_PORT`, `ARENA_SEED`). Every section is `#[serde(default)]` so a
//! config file only needs the keys it changes.

use crate::logging::TracingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub ticks: TickConfig,
    pub world: WorldConfig,
    pub logging: TracingConfig,
    /// Fixed world RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            allowed_origins: Vec::new(),
        }
    }
}

/// Periods of the independent world tasks, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    pub broadcast_ms: u64,
    pub mob_ai_ms: u64,
    pub combat_ms: u64,
    pub petals_ms: u64,
    pub spawn_ms: u64,
    /// Warn when no broadcast tick completed within this window
    pub stall_threshold_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            broadcast_ms: 16,
            mob_ai_ms: 100,
            combat_ms: 100,
            petals_ms: 100,
            spawn_ms: 5_000,
            stall_threshold_ms: 10_000,
        }
    }
}

impl TickConfig {
    pub fn broadcast(&self) -> Duration {
        Duration::from_millis(self.broadcast_ms)
    }

    pub fn mob_ai(&self) -> Duration {
        Duration::from_millis(self.mob_ai_ms)
    }

    pub fn combat(&self) -> Duration {
        Duration::from_millis(self.combat_ms)
    }

    pub fn petals(&self) -> Duration {
        Duration::from_millis(self.petals_ms)
    }

    pub fn spawn(&self) -> Duration {
        Duration::from_millis(self.spawn_ms)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.stall_threshold_ms)
    }
}

/// Gameplay tuning consumed by the world simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    // Spawning
    pub mob_cap_per_zone: usize,
    pub spawn_batch_max: usize,
    pub spawn_attempts_per_cycle: usize,
    /// Candidate spawn points must be farther than `radius * factor` from players
    pub spawn_exclusion_factor: f64,

    // Players
    pub player_speed: f64,
    pub player_radius: f64,
    pub player_max_health: i32,
    pub player_collision_damage: i32,
    pub player_hit_cooldown_ms: u64,
    pub player_separation_buffer: f64,
    /// Fraction of the remaining overlap corrected per move
    pub player_separation_strength: f64,
    /// Width of the strip at the starting zone's left edge used for spawns
    pub player_spawn_width: f64,
    pub player_spawn_mob_clearance: f64,

    // Portals
    pub portal_radius: f64,
    pub portal_cooldown_ms: u64,

    // Mobs
    pub mob_hit_cooldown_ms: u64,

    // Petals & drops
    pub petal_attack_cooldown_ms: u64,
    pub petal_contact_radius: f64,
    pub petal_revive_delay_ms: u64,
    pub drop_lifetime_ms: u64,
    pub drop_pickup_radius: f64,
    /// `None` lets players carry any number of petals
    pub max_petals_per_player: Option<usize>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            mob_cap_per_zone: 10,
            spawn_batch_max: 3,
            spawn_attempts_per_cycle: 50,
            spawn_exclusion_factor: 8.0,

            player_speed: 2.5,
            player_radius: 15.0,
            player_max_health: 100,
            player_collision_damage: 25,
            player_hit_cooldown_ms: 100,
            player_separation_buffer: 5.0,
            player_separation_strength: 0.3,
            player_spawn_width: 250.0,
            player_spawn_mob_clearance: 100.0,

            portal_radius: 100.0,
            portal_cooldown_ms: 10_000,

            mob_hit_cooldown_ms: 100,

            petal_attack_cooldown_ms: 500,
            petal_contact_radius: 10.0,
            petal_revive_delay_ms: 5_000,
            drop_lifetime_ms: 30_000,
            drop_pickup_radius: 30.0,
            max_petals_per_player: None,
        }
    }
}

impl WorldConfig {
    pub fn portal_cooldown(&self) -> Duration {
        Duration::from_millis(self.portal_cooldown_ms)
    }

    pub fn player_hit_cooldown(&self) -> Duration {
        Duration::from_millis(self.player_hit_cooldown_ms)
    }

    pub fn mob_hit_cooldown(&self) -> Duration {
        Duration::from_millis(self.mob_hit_cooldown_ms)
    }

    pub fn petal_attack_cooldown(&self) -> Duration {
        Duration::from_millis(self.petal_attack_cooldown_ms)
    }

    pub fn petal_revive_delay(&self) -> Duration {
        Duration::from_millis(self.petal_revive_delay_ms)
    }

    pub fn drop_lifetime(&self) -> Duration {
        Duration::from_millis(self.drop_lifetime_ms)
    }
}

impl ServerConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("ARENA_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply `ARENA_*` overrides from an arbitrary lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ARENA_HOST") {
            self.network.host = host;
        }
        if let Some(port) = lookup("ARENA_PORT") {
            self.network.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "ARENA_PORT", value: port })?;
        }
        if let Some(seed) = lookup("ARENA_SEED") {
            self.seed = Some(
                seed.parse()
                    .map_err(|_| ConfigError::InvalidValue { key: "ARENA_SEED", value: seed })?,
            );
        }
        if let Some(level) = lookup("ARENA_LOG_LEVEL") {
            self.logging.default_level = crate::logging::LogLevel::parse(&level)
                .ok_or(ConfigError::InvalidValue { key: "ARENA_LOG_LEVEL", value: level })?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.network.host, self.network.port)
    }
}
