//! Combat - contact damage between players and mobs, deaths and respawns
//!
//! Damage is exchanged on overlap, each side gated by its own hit cooldown.
//! A mob reduced to zero health stays in the store until the next
//! [`World::remove_dead_mobs`] sweep, which turns it into a single drop for
//! whoever landed the killing blow.

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::protocol::ServerMessage;
use crate::snapshot::DropView;
use crate::world::{Killer, MobId, Outbox, PlayerId, World, WorldError};

/// What one combat tick did
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CombatReport {
    pub hits_on_players: usize,
    pub hits_on_mobs: usize,
    pub players_killed: Vec<PlayerId>,
    pub mobs_removed: Vec<MobId>,
}

impl World {
    /// One combat tick: contact damage, then the dead-mob sweep
    pub fn combat_tick(&mut self, now: Instant) -> CombatReport {
        let mut report = self.resolve_player_mob_contacts(now);
        report.mobs_removed = self.remove_dead_mobs(now);
        report
    }

    /// Exchange contact damage between overlapping players and mobs
    pub fn resolve_player_mob_contacts(&mut self, now: Instant) -> CombatReport {
        let mob_cooldown = self.config.mob_hit_cooldown();
        let player_cooldown = self.config.player_hit_cooldown();
        let mut report = CombatReport::default();
        let mut outbox = Outbox::new();
        let mut deaths: Vec<(PlayerId, MobId)> = Vec::new();

        let World { players, mobs, .. } = self;
        for mob in mobs.values_mut() {
            for player in players.values_mut() {
                if !mob.is_alive() {
                    break;
                }
                if !player.is_alive() || player.current_zone != mob.zone {
                    continue;
                }
                if mob.distance_to(player.position) >= mob.radius + player.radius {
                    continue;
                }

                if now.saturating_duration_since(mob.last_hit) >= mob_cooldown {
                    mob.last_hit = now;
                    let died = player.take_damage(mob.damage);
                    report.hits_on_players += 1;
                    outbox.push((
                        player.id,
                        ServerMessage::DamageTaken {
                            mob_id: mob.id,
                            damage: mob.damage,
                            health: player.health,
                        },
                    ));
                    if died {
                        deaths.push((player.id, mob.id));
                        continue;
                    }
                }

                if player.can_hit(now, player_cooldown) {
                    player.last_hit = Some(now);
                    mob.take_damage(player.collision_damage, Killer::Player(player.id));
                    report.hits_on_mobs += 1;
                    debug!(
                        player_id = player.id,
                        mob_id = mob.id,
                        mob_health = mob.health,
                        "player hit mob"
                    );
                }
            }
        }

        for (player_id, mob_id) in deaths {
            self.kill_player(player_id, mob_id, &mut outbox);
            report.players_killed.push(player_id);
        }
        self.dispatch(outbox);
        report
    }

    /// Strip a dead player's petals and tell them who did it
    fn kill_player(&mut self, id: PlayerId, killed_by: MobId, outbox: &mut Outbox) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        let lost = player.petals.len();
        player.petals.clear();
        info!(player_id = id, mob_id = killed_by, petals_lost = lost, "player died");
        outbox.push((id, ServerMessage::PlayerDied { killed_by }));
    }

    /// Remove every dead mob exactly once, leaving one drop for its killer
    pub fn remove_dead_mobs(&mut self, now: Instant) -> Vec<MobId> {
        let dead: Vec<MobId> = self
            .mobs
            .values()
            .filter(|m| !m.is_alive())
            .map(|m| m.id)
            .collect();
        let mut outbox = Outbox::new();

        for id in &dead {
            let Some(mob) = self.mobs.remove(id) else {
                continue;
            };
            let Some(killer) = mob.last_hit_by else {
                warn!(mob_id = mob.id, "mob died without a recorded attacker, no drop");
                continue;
            };
            let owner = killer.owner();

            info!(
                mob_id = mob.id,
                kind = ?mob.kind,
                rarity = ?mob.rarity,
                owner_id = owner,
                "mob killed"
            );
            let kill_notice = match killer {
                Killer::Player(_) => ServerMessage::MobKilled {
                    mob_id: mob.id,
                    mob_type: mob.kind,
                    rarity: mob.rarity,
                },
                Killer::Petal { petal, .. } => ServerMessage::MobKilledByPetal {
                    mob_id: mob.id,
                    mob_type: mob.kind,
                    rarity: mob.rarity,
                    petal_id: petal,
                },
            };
            outbox.push((owner, kill_notice));

            let drop_id = self.insert_drop(mob.kind.loot(), mob.position, owner, &mob.zone, now);
            if let Some(drop) = self.drops.get(&drop_id) {
                outbox.push((owner, ServerMessage::PetalDropCreated(DropView::from(drop))));
            }
        }

        self.dispatch(outbox);
        dead
    }

    /// Bring a dead player back at a fresh spawn point with full health
    pub fn respawn_player(&mut self, id: PlayerId) -> Result<(), WorldError> {
        let player = self.players.get(&id).ok_or(WorldError::UnknownPlayer(id))?;
        if player.is_alive() {
            return Err(WorldError::PlayerAlive(id));
        }
        let position = self.safe_player_spawn();
        let zone = crate::zones::STARTING_ZONE;
        let player = self.players.get_mut(&id).ok_or(WorldError::UnknownPlayer(id))?;
        player.respawn_at(position, zone);
        info!(player_id = id, x = position.x, y = position.y, "player respawned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::mob::{MobBlueprint, MobType, Rarity};
    use crate::petal::{Petal, PetalType};
    use crate::world::{outbound_queue, OutboundReceiver};
    use crate::zones::ZoneTable;
    use glam::DVec2;
    use std::time::Duration;

    fn world() -> World {
        World::new(WorldConfig::default(), ZoneTable::standard(), Some(5))
    }

    fn join(world: &mut World, at: DVec2) -> (PlayerId, OutboundReceiver) {
        let (tx, rx) = outbound_queue();
        let id = world.add_player(tx, "user", "tester").id;
        world.player_mut(id).unwrap().position = at;
        (id, rx)
    }

    fn drain(rx: &mut OutboundReceiver) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn spawn(world: &mut World, kind: MobType, at: DVec2, now: Instant) -> MobId {
        let bp = MobBlueprint::with_rarity(kind, Rarity::Common, 0.0);
        world.insert_mob(&bp, "common", at, now).unwrap()
    }

    #[test]
    fn test_contact_exchanges_damage() {
        let mut world = world();
        let spawned = Instant::now();
        let (pid, mut rx) = join(&mut world, DVec2::new(500.0, 500.0));
        let mid = spawn(&mut world, MobType::Wolf, DVec2::new(510.0, 500.0), spawned);

        let now = spawned + Duration::from_millis(100);
        let report = world.resolve_player_mob_contacts(now);
        assert_eq!(report.hits_on_players, 1);
        assert_eq!(report.hits_on_mobs, 1);
        assert_eq!(world.player(pid).unwrap().health, 90);
        assert_eq!(world.mob(mid).unwrap().health, 15);

        let messages = drain(&mut rx);
        assert_eq!(
            messages,
            vec![ServerMessage::DamageTaken { mob_id: mid, damage: 10, health: 90 }]
        );
    }

    #[test]
    fn test_hit_cooldowns_gate_damage() {
        let mut world = world();
        let spawned = Instant::now();
        let (pid, _rx) = join(&mut world, DVec2::new(500.0, 500.0));
        let mid = spawn(&mut world, MobType::Orc, DVec2::new(510.0, 500.0), spawned);

        let now = spawned + Duration::from_millis(100);
        world.resolve_player_mob_contacts(now);
        world.resolve_player_mob_contacts(now + Duration::from_millis(50));
        assert_eq!(world.player(pid).unwrap().health, 85);
        assert_eq!(world.mob(mid).unwrap().health, 55);

        world.resolve_player_mob_contacts(now + Duration::from_millis(100));
        assert_eq!(world.player(pid).unwrap().health, 70);
        assert_eq!(world.mob(mid).unwrap().health, 30);
    }

    #[test]
    fn test_no_damage_without_overlap() {
        let mut world = world();
        let now = Instant::now() + Duration::from_secs(1);
        let (pid, _rx) = join(&mut world, DVec2::new(500.0, 500.0));
        spawn(&mut world, MobType::Wolf, DVec2::new(540.0, 500.0), now);
        let report = world.resolve_player_mob_contacts(now + Duration::from_secs(1));
        assert_eq!(report, CombatReport::default());
        assert_eq!(world.player(pid).unwrap().health, 100);
    }

    #[test]
    fn test_kill_leaves_one_drop_for_killer() {
        let mut world = world();
        let spawned = Instant::now();
        let (pid, mut rx) = join(&mut world, DVec2::new(500.0, 500.0));
        let mid = spawn(&mut world, MobType::Goblin, DVec2::new(505.0, 500.0), spawned);

        let t1 = spawned + Duration::from_millis(100);
        world.combat_tick(t1);
        let t2 = t1 + Duration::from_millis(100);
        let report = world.combat_tick(t2);

        assert_eq!(report.mobs_removed, vec![mid]);
        assert!(world.mob(mid).is_none());
        let drops: Vec<_> = world.drops().collect();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].kind, PetalType::Goblin);
        assert_eq!(drops[0].owner_id, pid);
        assert_eq!(drops[0].position, DVec2::new(505.0, 500.0));

        let kinds: Vec<_> = drain(&mut rx).iter().map(|m| m.kind()).collect();
        assert!(kinds.ends_with(&["mob_killed", "petal_drop_created"]));

        // A second sweep finds nothing
        assert!(world.remove_dead_mobs(t2).is_empty());
        assert_eq!(world.drops().count(), 1);
    }

    #[test]
    fn test_petal_kill_attributed_to_owner() {
        let mut world = world();
        let now = Instant::now();
        let (pid, mut rx) = join(&mut world, DVec2::new(100.0, 100.0));
        let mid = spawn(&mut world, MobType::Wolf, DVec2::new(800.0, 800.0), now);
        world
            .mob_mut(mid)
            .unwrap()
            .take_damage(1000, Killer::Petal { owner: pid, petal: 77 });

        world.remove_dead_mobs(now);
        let messages = drain(&mut rx);
        assert_eq!(
            messages[0],
            ServerMessage::MobKilledByPetal {
                mob_id: mid,
                mob_type: MobType::Wolf,
                rarity: Rarity::Common,
                petal_id: 77
            }
        );
        assert_eq!(world.drops().next().unwrap().kind, PetalType::Wolf);
    }

    #[test]
    fn test_player_death_strips_petals_and_blocks() {
        let mut world = world();
        let spawned = Instant::now();
        let (pid, mut rx) = join(&mut world, DVec2::new(500.0, 500.0));
        {
            let player = world.player_mut(pid).unwrap();
            player.health = 5;
            player.petals.insert(900, Petal::new(900, PetalType::Orc, pid, player.position, spawned));
        }
        let mid = spawn(&mut world, MobType::Orc, DVec2::new(510.0, 500.0), spawned);

        let now = spawned + Duration::from_millis(100);
        let report = world.resolve_player_mob_contacts(now);
        assert_eq!(report.players_killed, vec![pid]);
        // A dead player deals no damage back
        assert_eq!(world.mob(mid).unwrap().health, 80);

        let player = world.player(pid).unwrap();
        assert!(!player.is_alive());
        assert!(player.petals.is_empty());
        assert!(drain(&mut rx).contains(&ServerMessage::PlayerDied { killed_by: mid }));

        assert_eq!(world.move_player(pid, 1.0, 0.0, now), Err(WorldError::PlayerDead(pid)));
    }

    #[test]
    fn test_respawn() {
        let mut world = world();
        let (pid, _rx) = join(&mut world, DVec2::new(900.0, 900.0));
        assert_eq!(world.respawn_player(pid), Err(WorldError::PlayerAlive(pid)));

        world.player_mut(pid).unwrap().health = 0;
        world.respawn_player(pid).unwrap();
        let player = world.player(pid).unwrap();
        assert_eq!(player.health, 100);
        assert_eq!(player.current_zone, "common");
        assert!(player.position.x <= 250.0);

        assert_eq!(world.respawn_player(404), Err(WorldError::UnknownPlayer(404)));
    }
}
