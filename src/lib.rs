//! Petal Arena Server Library
//!
//! Authoritative simulation for a multiplayer top-down arena:
//! - Zones linked by portals, with per-zone mob populations
//! - Mob behaviour by temperament (aggressive, neutral, timid)
//! - Contact combat, loot drops and orbiting petals that fight and heal
//! - Periodic tick tasks and per-player zone-scoped snapshots
//! - WebSocket sessions behind a token-based auth boundary

pub mod api; // HTTP + WebSocket endpoints
pub mod auth; // Password hashing, session tokens
pub mod combat; // Player/mob contact damage, deaths, respawn
pub mod config; // ServerConfig: defaults, JSON file, env overrides
pub mod logging; // tracing-subscriber setup
pub mod loot; // Petal orbit/heal/fight, drops, pickup, revive
pub mod metrics; // Server metrics (Prometheus + JSON export)
pub mod mob; // Mob archetypes, rarity, rolled stats
pub mod mob_ai; // Behaviour state machines, mob separation
pub mod movement; // Player moves, clamping, portals
pub mod petal;
pub mod player;
pub mod protocol; // Wire messages
pub mod scheduler; // Periodic world tasks
pub mod session; // Per-connection reader/writer
pub mod snapshot; // Zone-scoped client views
pub mod spawner; // Mob population top-up, safe spawn points
pub mod storage; // Account repository
pub mod world;
pub mod zones; // Static zone/portal table

// Re-export commonly used types
pub use config::{ServerConfig, WorldConfig};
pub use metrics::ServerMetrics;
pub use protocol::{ClientMessage, ServerMessage};
pub use world::{SharedWorld, World, WorldError};
pub use zones::ZoneTable;
