//! Petal & Drop Lifecycle
//!
//! ## Petal tick
//! ```text
//! orbit every petal around its owner
//!   → active healers top up a hurt owner
//!   → active petals trade blows with overlapping mobs
//!   → expired drops vanish, owners standing on their drops pick them up
//! ```
//!
//! A petal knocked out in combat goes inactive and is reported back in
//! [`PetalReport::knocked_out`]; the scheduler revives it after the
//! configured delay with [`World::revive_petal`].

use std::time::Instant;
use tracing::{debug, info};

use crate::petal::Petal;
use crate::protocol::ServerMessage;
use crate::snapshot::PetalView;
use crate::world::{DropId, Killer, Outbox, PetalId, PlayerId, World, WorldError};

/// A petal waiting to be revived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnockedOut {
    pub owner_id: PlayerId,
    pub petal_id: PetalId,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PetalReport {
    pub healed: usize,
    pub petal_hits: usize,
    pub knocked_out: Vec<KnockedOut>,
    pub expired_drops: Vec<DropId>,
    pub picked_up: Vec<(PlayerId, PetalId)>,
}

impl World {
    /// One petal tick. `dt` is the elapsed time since the previous tick in seconds.
    pub fn update_petals(&mut self, now: Instant, dt: f64) -> PetalReport {
        let mut report = PetalReport::default();
        let mut outbox = Outbox::new();

        self.orbit_and_heal(now, dt, &mut report, &mut outbox);
        self.petal_mob_combat(now, &mut report, &mut outbox);
        self.dispatch(outbox);

        report.expired_drops = self.expire_drops(now);
        report.picked_up = self.auto_pickup(now);
        report
    }

    fn orbit_and_heal(&mut self, now: Instant, dt: f64, report: &mut PetalReport, outbox: &mut Outbox) {
        for player in self.players.values_mut() {
            if !player.is_alive() {
                continue;
            }
            let center = player.position;
            for petal in player.petals.values_mut() {
                petal.advance_orbit(center, dt);
            }

            let ready: Vec<(PetalId, i32)> = player
                .petals
                .values()
                .filter(|petal| petal.can_heal(now))
                .map(|petal| (petal.id, petal.heal_amount))
                .collect();
            for (petal_id, heal_amount) in ready {
                if player.health >= player.max_health {
                    break;
                }
                let amount = player.heal(heal_amount);
                if let Some(petal) = player.petals.get_mut(&petal_id) {
                    petal.last_heal = now;
                }
                report.healed += 1;
                outbox.push((
                    player.id,
                    ServerMessage::PetalHealed {
                        petal_id,
                        amount,
                        health: player.health,
                    },
                ));
            }
        }
    }

    fn petal_mob_combat(&mut self, now: Instant, report: &mut PetalReport, outbox: &mut Outbox) {
        let attack_cooldown = self.config.petal_attack_cooldown();
        let mob_cooldown = self.config.mob_hit_cooldown();
        let contact = self.config.petal_contact_radius;
        let revive_in = self.config.petal_revive_delay().as_secs_f64();

        let World { players, mobs, .. } = self;
        for player in players.values_mut() {
            if !player.is_alive() {
                continue;
            }
            for petal in player.petals.values_mut() {
                for mob in mobs.values_mut() {
                    if !petal.active {
                        break;
                    }
                    if !mob.is_alive() || mob.zone != player.current_zone {
                        continue;
                    }
                    if mob.distance_to(petal.position) >= mob.radius + contact {
                        continue;
                    }

                    if petal.can_attack(now, attack_cooldown) {
                        petal.last_attack = now;
                        mob.take_damage(
                            petal.damage,
                            Killer::Petal { owner: player.id, petal: petal.id },
                        );
                        report.petal_hits += 1;
                    }

                    if mob.is_alive() && now.saturating_duration_since(mob.last_hit) >= mob_cooldown {
                        mob.last_hit = now;
                        if petal.take_damage(mob.damage) {
                            debug!(player_id = player.id, petal_id = petal.id, mob_id = mob.id, "petal knocked out");
                            report.knocked_out.push(KnockedOut {
                                owner_id: player.id,
                                petal_id: petal.id,
                            });
                            outbox.push((
                                player.id,
                                ServerMessage::PetalDestroyed { petal_id: petal.id, revive_in },
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Remove drops past their lifetime
    pub fn expire_drops(&mut self, now: Instant) -> Vec<DropId> {
        let expired: Vec<DropId> = self
            .drops
            .values()
            .filter(|d| d.is_expired(now))
            .map(|d| d.id)
            .collect();
        for id in &expired {
            self.drops.remove(id);
            debug!(drop_id = id, "drop expired");
        }
        expired
    }

    /// Owners standing within pickup range collect their drops
    fn auto_pickup(&mut self, now: Instant) -> Vec<(PlayerId, PetalId)> {
        let radius = self.config.drop_pickup_radius;
        let candidates: Vec<(DropId, PlayerId)> = self
            .drops
            .values()
            .filter(|drop| {
                self.players.get(&drop.owner_id).is_some_and(|owner| {
                    owner.is_alive()
                        && owner.current_zone == drop.zone
                        && owner.position.distance(drop.position) <= radius
                })
            })
            .map(|drop| (drop.id, drop.owner_id))
            .collect();

        let mut picked = Vec::new();
        for (drop_id, owner_id) in candidates {
            match self.pickup_drop(drop_id, owner_id, now) {
                Ok(petal_id) => picked.push((owner_id, petal_id)),
                Err(e) => debug!(drop_id, player_id = owner_id, error = %e, "pickup refused"),
            }
        }
        picked
    }

    /// Turn a drop into a petal for `player_id`. Only the owner standing in
    /// range may pick it up; refused pickups leave the drop untouched.
    pub fn pickup_drop(
        &mut self,
        drop_id: DropId,
        player_id: PlayerId,
        now: Instant,
    ) -> Result<PetalId, WorldError> {
        let drop = self.drops.get(&drop_id).ok_or(WorldError::UnknownDrop(drop_id))?;
        if !drop.can_be_picked_by(player_id) {
            return Err(WorldError::NotDropOwner { drop_id, player_id });
        }
        let player = self.players.get(&player_id).ok_or(WorldError::UnknownPlayer(player_id))?;
        if !player.is_alive() {
            return Err(WorldError::PlayerDead(player_id));
        }
        if player.current_zone != drop.zone
            || player.position.distance(drop.position) > self.config.drop_pickup_radius
        {
            return Err(WorldError::OutOfReach(drop_id));
        }
        if let Some(limit) = self.config.max_petals_per_player {
            if player.petals.len() >= limit {
                return Err(WorldError::PetalLimit(limit));
            }
        }

        let kind = drop.kind;
        let petal_id = self.allocate_id();
        self.drops.remove(&drop_id);
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(WorldError::UnknownPlayer(player_id))?;
        let petal = Petal::new(petal_id, kind, player_id, player.position, now);
        let view = PetalView::from(&petal);
        player.petals.insert(petal_id, petal);

        info!(player_id, petal_id, kind = ?kind, "petal picked up");
        self.notify(player_id, ServerMessage::PetalPickedUp(view));
        Ok(petal_id)
    }

    /// Restore a knocked-out petal. The owner may have died or left since.
    pub fn revive_petal(&mut self, owner_id: PlayerId, petal_id: PetalId) -> Result<(), WorldError> {
        let player = self
            .players
            .get_mut(&owner_id)
            .ok_or(WorldError::UnknownPlayer(owner_id))?;
        let petal = player
            .petals
            .get_mut(&petal_id)
            .ok_or(WorldError::UnknownPetal(petal_id))?;
        if petal.active {
            return Ok(());
        }
        petal.revive();
        debug!(player_id = owner_id, petal_id, "petal revived");
        self.notify(owner_id, ServerMessage::PetalRespawned { petal_id });
        Ok(())
    }
}
