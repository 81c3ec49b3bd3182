//! World - the single authoritative store of every live entity
//!
//! ## Ownership
//! ```text
//! SharedWorld = Arc<RwLock<World>>
//!   ├─ players      BTreeMap<PlayerId, Player>   (each owns its petals)
//!   ├─ mobs         BTreeMap<MobId, Mob>
//!   ├─ drops        BTreeMap<DropId, PetalDrop>
//!   └─ connections  HashMap<PlayerId, Outbound>  (per-connection send queues)
//! ```
//!
//! Every mutation happens behind the one write lock. Connection handlers and
//! periodic tasks hold it only for the synchronous span of a single
//! operation; nothing here awaits. Notifications go onto bounded
//! per-connection queues with `try_send`, so sending never blocks while the
//! lock is held and a stalled client cannot grow memory without limit.
//!
//! Behaviour is split across `impl World` blocks by subsystem:
//! [`crate::movement`], [`crate::mob_ai`], [`crate::spawner`],
//! [`crate::combat`], [`crate::loot`] and [`crate::snapshot`].

use glam::DVec2;
use parking_lot::RwLock;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace};

use crate::config::WorldConfig;
use crate::mob::{Mob, MobBlueprint};
use crate::petal::{PetalDrop, PetalType};
use crate::player::{random_color, Player};
use crate::protocol::ServerMessage;
use crate::zones::{ZoneTable, STARTING_ZONE};

pub type PlayerId = u64;
pub type MobId = u64;
pub type PetalId = u64;
pub type DropId = u64;

/// Messages a connection may have queued before it counts as stalled
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Send half of a connection's outbound queue
pub type Outbound = mpsc::Sender<ServerMessage>;

/// Receive half of a connection's outbound queue, drained by its writer
pub type OutboundReceiver = mpsc::Receiver<ServerMessage>;

/// A fresh bounded queue for one connection
pub fn outbound_queue() -> (Outbound, OutboundReceiver) {
    mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
}

pub type SharedWorld = Arc<RwLock<World>>;

/// Notifications produced during an operation, delivered after it completes
pub(crate) type Outbox = Vec<(PlayerId, ServerMessage)>;

/// Who landed a hit; drops go to the owning player either way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Killer {
    Player(PlayerId),
    Petal { owner: PlayerId, petal: PetalId },
}

impl Killer {
    pub fn owner(&self) -> PlayerId {
        match self {
            Killer::Player(id) => *id,
            Killer::Petal { owner, .. } => *owner,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WorldError {
    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),
    #[error("Player {0} is dead")]
    PlayerDead(PlayerId),
    #[error("Player {0} is still alive")]
    PlayerAlive(PlayerId),
    #[error("Unknown zone: {0}")]
    UnknownZone(String),
    #[error("Unknown drop: {0}")]
    UnknownDrop(DropId),
    #[error("Unknown petal: {0}")]
    UnknownPetal(PetalId),
    #[error("Drop {drop_id} is not owned by player {player_id}")]
    NotDropOwner { drop_id: DropId, player_id: PlayerId },
    #[error("Drop {0} is out of reach")]
    OutOfReach(DropId),
    #[error("Petal limit reached ({0})")]
    PetalLimit(usize),
    #[error("Movement intent must be finite and non-zero")]
    InvalidIntent,
}

pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) zones: ZoneTable,
    pub(crate) players: BTreeMap<PlayerId, Player>,
    pub(crate) mobs: BTreeMap<MobId, Mob>,
    pub(crate) drops: BTreeMap<DropId, PetalDrop>,
    connections: HashMap<PlayerId, Outbound>,
    pub(crate) rng: Xoshiro256PlusPlus,
    next_id: u64,
}

impl World {
    /// Build an empty world. A fixed `seed` makes every random draw reproducible.
    pub fn new(config: WorldConfig, zones: ZoneTable, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        info!(
            zones = zones.zones().len(),
            portals = zones.portals().count(),
            seed,
            "world created"
        );
        Self {
            config,
            zones,
            players: BTreeMap::new(),
            mobs: BTreeMap::new(),
            drops: BTreeMap::new(),
            connections: HashMap::new(),
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            next_id: 1,
        }
    }

    pub fn into_shared(self) -> SharedWorld {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    pub(crate) fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ========================================================================
    // Players & connections
    // ========================================================================

    /// Register a connected player at a safe spawn point in the starting zone
    pub fn add_player(&mut self, outbound: Outbound, user_id: &str, username: &str) -> Player {
        let id = self.allocate_id();
        let position = self.safe_player_spawn();
        let color = random_color(&mut self.rng);
        let player = Player::new(
            id,
            user_id,
            username,
            position,
            STARTING_ZONE,
            color,
            &self.config,
        );

        self.players.insert(id, player.clone());
        self.connections.insert(id, outbound);
        info!(
            player_id = id,
            user_id,
            username,
            x = position.x,
            y = position.y,
            "player joined"
        );
        player
    }

    /// Drop a player and its connection. Unknown ids are a no-op.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.connections.remove(&id);
        let removed = self.players.remove(&id);
        if let Some(player) = &removed {
            info!(player_id = id, username = %player.username, "player left");
        }
        removed
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub(crate) fn connection(&self, id: PlayerId) -> Option<&Outbound> {
        self.connections.get(&id)
    }

    /// Queue a message for one player. A closed queue is left for the
    /// broadcaster to clean up.
    pub fn notify(&self, id: PlayerId, message: ServerMessage) {
        let Some(outbound) = self.connections.get(&id) else {
            trace!(player_id = id, kind = message.kind(), "no connection for notification");
            return;
        };
        match outbound.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                debug!(player_id = id, kind = message.kind(), "notification dropped: queue full");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(player_id = id, "notification dropped: connection closed");
            }
        }
    }

    pub(crate) fn dispatch(&self, outbox: Outbox) {
        for (id, message) in outbox {
            self.notify(id, message);
        }
    }

    // ========================================================================
    // Mobs & drops
    // ========================================================================

    pub fn mob(&self, id: MobId) -> Option<&Mob> {
        self.mobs.get(&id)
    }

    pub fn mob_mut(&mut self, id: MobId) -> Option<&mut Mob> {
        self.mobs.get_mut(&id)
    }

    pub fn mobs(&self) -> impl Iterator<Item = &Mob> {
        self.mobs.values()
    }

    pub fn mob_count(&self) -> usize {
        self.mobs.len()
    }

    pub fn zone_population(&self, zone: &str) -> usize {
        self.mobs.values().filter(|m| m.zone == zone).count()
    }

    /// Place a mob with already-rolled stats
    pub fn insert_mob(
        &mut self,
        blueprint: &MobBlueprint,
        zone: &str,
        position: DVec2,
        now: Instant,
    ) -> Result<MobId, WorldError> {
        if self.zones.zone(zone).is_none() {
            return Err(WorldError::UnknownZone(zone.to_string()));
        }
        let id = self.allocate_id();
        let mob = Mob::from_blueprint(id, blueprint, zone, position, now);
        debug!(
            mob_id = id,
            kind = ?mob.kind,
            rarity = ?mob.rarity,
            zone,
            "mob spawned"
        );
        self.mobs.insert(id, mob);
        Ok(id)
    }

    pub fn petal_drop(&self, id: DropId) -> Option<&PetalDrop> {
        self.drops.get(&id)
    }

    pub fn drops(&self) -> impl Iterator<Item = &PetalDrop> {
        self.drops.values()
    }

    /// Leave a drop on the ground for `owner_id`
    pub fn insert_drop(
        &mut self,
        kind: PetalType,
        position: DVec2,
        owner_id: PlayerId,
        zone: &str,
        now: Instant,
    ) -> DropId {
        let id = self.allocate_id();
        let drop = PetalDrop {
            id,
            kind,
            position,
            owner_id,
            zone: zone.to_string(),
            created_at: now,
            lifetime: self.config.drop_lifetime(),
        };
        self.drops.insert(id, drop);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mob::{MobType, Rarity};

    fn test_world() -> World {
        World::new(WorldConfig::default(), ZoneTable::standard(), Some(42))
    }

    #[test]
    fn test_add_player_spawns_in_starting_strip() {
        let mut world = test_world();
        let (tx, _rx) = outbound_queue();
        let player = world.add_player(tx, "u1", "alice");

        assert_eq!(player.current_zone, "common");
        assert_eq!(player.health, 100);
        assert!(player.position.x >= 0.0 && player.position.x <= 250.0);
        assert!(player.position.y >= 0.0 && player.position.y <= 1000.0);
        assert_eq!(world.player_count(), 1);
    }

    #[test]
    fn test_ids_unique_across_entities() {
        let mut world = test_world();
        let now = Instant::now();
        let (tx, _rx) = outbound_queue();
        let player = world.add_player(tx, "u1", "alice");
        let bp = MobBlueprint::with_rarity(MobType::Orc, Rarity::Common, 0.0);
        let mob = world.insert_mob(&bp, "common", DVec2::new(500.0, 500.0), now).unwrap();
        let drop = world.insert_drop(PetalType::Orc, DVec2::ZERO, player.id, "common", now);
        assert_ne!(player.id, mob);
        assert_ne!(mob, drop);
    }

    #[test]
    fn test_remove_player_is_idempotent() {
        let mut world = test_world();
        let (tx, _rx) = outbound_queue();
        let id = world.add_player(tx, "u1", "alice").id;
        assert!(world.remove_player(id).is_some());
        assert!(world.remove_player(id).is_none());
        assert!(world.connection(id).is_none());
    }

    #[test]
    fn test_notify_reaches_queue() {
        let mut world = test_world();
        let (tx, mut rx) = outbound_queue();
        let id = world.add_player(tx, "u1", "alice").id;
        world.notify(id, ServerMessage::Pong);
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Pong);
    }

    #[test]
    fn test_notify_closed_queue_does_not_panic() {
        let mut world = test_world();
        let (tx, rx) = outbound_queue();
        let id = world.add_player(tx, "u1", "alice").id;
        drop(rx);
        world.notify(id, ServerMessage::Pong);
        world.notify(9999, ServerMessage::Pong);
    }

    #[test]
    fn test_notify_full_queue_drops_without_blocking() {
        let mut world = test_world();
        let (tx, mut rx) = outbound_queue();
        let id = world.add_player(tx, "u1", "alice").id;
        for _ in 0..OUTBOUND_QUEUE_CAPACITY + 10 {
            world.notify(id, ServerMessage::Pong);
        }
        let mut queued = 0;
        while rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, OUTBOUND_QUEUE_CAPACITY);
    }

    #[test]
    fn test_insert_mob_unknown_zone() {
        let mut world = test_world();
        let bp = MobBlueprint::with_rarity(MobType::Wolf, Rarity::Common, 0.0);
        assert_eq!(
            world.insert_mob(&bp, "nowhere", DVec2::ZERO, Instant::now()),
            Err(WorldError::UnknownZone("nowhere".into()))
        );
    }

    #[test]
    fn test_killer_owner() {
        assert_eq!(Killer::Player(3).owner(), 3);
        assert_eq!(Killer::Petal { owner: 4, petal: 10 }.owner(), 4);
    }
}
