//! Mob AI - per-archetype behaviour state machines and mob-mob separation
//!
//! ## Tick
//! ```text
//! for each mob (id order):
//!     nearest living player in the same zone
//!     crowd avoidance redirect (first overlapping neighbour wins)
//!     temperament FSM:
//!         Aggressive (orc)   Wandering ⇄ Chasing ⇄ Attacking
//!         Timid (goblin)     Wandering ⇄ Fleeing
//!         Neutral (wolf)     Wandering
//!     steer toward target, clamp to zone
//! then: pairwise push-apart + target deflection
//! ```

use glam::DVec2;
use rand::Rng;
use std::f64::consts::FRAC_PI_2;
use std::time::{Duration, Instant};

use crate::mob::{Mob, MobState, Temperament};
use crate::player::Player;
use crate::world::{MobId, World};

// ============================================================================
// Tuning
// ============================================================================

/// Gap kept between touching mobs
pub const MOB_COLLISION_BUFFER: f64 = 2.0;
/// Push strength applied to each side of an overlapping pair
pub const MOB_AVOIDANCE_FORCE: f64 = 1.5;
/// Extra look-ahead when redirecting away from a crowded neighbour
const CROWD_MARGIN: f64 = 10.0;
const CROWD_ESCAPE: f64 = 30.0;
/// Deflection applied to targets of colliding mobs
const DEFLECTION_ANGLE: f64 = FRAC_PI_2 * 0.7;

const WANDER_RETARGET: Duration = Duration::from_secs(3);

const ORC_WANDER_SPEED: f64 = 0.8;
const ORC_CHASE_SPEED: f64 = 18.0;
const ORC_REAIM: Duration = Duration::from_millis(300);
const ORC_ATTACK_COOLDOWN: Duration = Duration::from_secs(2);
const ORC_MELEE_MARGIN: f64 = 10.0;
const ORC_LUNGE_MARGIN: f64 = 5.0;

const GOBLIN_FLEE_DISTANCE: f64 = 200.0;

/// The player a mob reacts to this tick
#[derive(Debug, Clone, Copy)]
pub struct Sighting {
    pub position: DVec2,
    pub radius: f64,
    pub distance: f64,
}

fn nearest_player<'a>(
    players: impl Iterator<Item = &'a Player>,
    mob: &Mob,
) -> Option<Sighting> {
    players
        .filter(|p| p.is_alive() && p.current_zone == mob.zone)
        .map(|p| Sighting {
            position: p.position,
            radius: p.radius,
            distance: mob.distance_to(p.position),
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Escape target away from the first same-zone mob crowding this one
fn crowd_redirect<'a>(mob: &Mob, others: impl Iterator<Item = &'a Mob>) -> Option<DVec2> {
    others
        .filter(|o| o.id != mob.id && o.zone == mob.zone)
        .find_map(|other| {
            let offset = mob.position - other.position;
            let min_distance = mob.radius + other.radius + MOB_COLLISION_BUFFER + CROWD_MARGIN;
            if offset.length_squared() >= min_distance * min_distance {
                return None;
            }
            let angle = offset.y.atan2(offset.x);
            Some(mob.position + DVec2::from_angle(angle) * (min_distance + CROWD_ESCAPE))
        })
}

// ============================================================================
// Behaviours
// ============================================================================

fn wander<R: Rng + ?Sized>(mob: &mut Mob, now: Instant, rng: &mut R) {
    mob.state = MobState::Wandering;
    if mob.target.is_none() || now.saturating_duration_since(mob.last_retarget) > WANDER_RETARGET {
        mob.set_random_target(rng, now);
    }
}

pub fn update_aggressive<R: Rng + ?Sized>(
    mob: &mut Mob,
    sighting: Option<Sighting>,
    now: Instant,
    rng: &mut R,
) {
    let Some(player) = sighting.filter(|s| s.distance <= mob.detection_range) else {
        mob.speed = ORC_WANDER_SPEED;
        wander(mob, now, rng);
        return;
    };

    if !matches!(mob.state, MobState::Chasing | MobState::Attacking) {
        mob.state = MobState::Chasing;
    }

    let melee_range = mob.radius + player.radius + ORC_MELEE_MARGIN;
    if player.distance <= melee_range {
        if now >= mob.attack_ready_at {
            mob.state = MobState::Attacking;
            mob.attack_ready_at = now + ORC_ATTACK_COOLDOWN;

            let toward = (player.position - mob.position).try_normalize().unwrap_or(DVec2::X);
            let standoff = mob.radius + player.radius + ORC_LUNGE_MARGIN;
            mob.target = Some(player.position - toward * standoff);
            mob.speed = ORC_CHASE_SPEED;
        }
        return;
    }

    mob.state = MobState::Chasing;
    if now.saturating_duration_since(mob.last_retarget) <= ORC_REAIM {
        return;
    }

    // Weave: three superimposed waves plus jitter so chasers don't beeline
    let offset = player.position - mob.position;
    let base_angle = offset.y.atan2(offset.x);
    let t = now.saturating_duration_since(mob.spawned_at).as_secs_f64();
    let wave1 = (t * 3.0).sin() * 0.8;
    let wave2 = (t * 1.5).sin() * 1.2;
    let wave3 = (t * 2.0).cos() * 0.6;
    let deviation = (wave1 + wave2 + wave3) * 0.4 + (rng.gen::<f64>() - 0.5) * 0.3;
    let angle = base_angle + deviation;

    let approach = (player.distance * 0.3).clamp(40.0, 100.0);
    mob.target = Some(player.position - DVec2::from_angle(angle) * approach);
    mob.last_retarget = now;
    mob.speed = ORC_CHASE_SPEED + wave1.abs() * 0.6;
}

pub fn update_neutral<R: Rng + ?Sized>(mob: &mut Mob, now: Instant, rng: &mut R) {
    if mob.state != MobState::Wandering
        || mob.target.is_none()
        || now.saturating_duration_since(mob.last_retarget) > WANDER_RETARGET
    {
        mob.state = MobState::Wandering;
        mob.set_random_target(rng, now);
    }
}

pub fn update_timid<R: Rng + ?Sized>(
    mob: &mut Mob,
    sighting: Option<Sighting>,
    now: Instant,
    rng: &mut R,
) {
    match sighting.filter(|s| s.distance <= mob.detection_range) {
        Some(player) => {
            mob.state = MobState::Fleeing;
            let away = (mob.position - player.position)
                .try_normalize()
                .unwrap_or(DVec2::X);
            mob.target = Some(mob.position + away * GOBLIN_FLEE_DISTANCE);
            mob.last_retarget = now;
        }
        None => wander(mob, now, rng),
    }
}

// ============================================================================
// World tick
// ============================================================================

impl World {
    /// One AI tick: behaviours in id order, then mob-mob separation
    pub fn update_mobs(&mut self, now: Instant) {
        let ids: Vec<MobId> = self.mobs.keys().copied().collect();

        for id in ids {
            let (sighting, redirect) = match self.mobs.get(&id) {
                Some(mob) => (
                    nearest_player(self.players.values(), mob),
                    crowd_redirect(mob, self.mobs.values()),
                ),
                None => continue,
            };
            let Some(mob) = self.mobs.get_mut(&id) else {
                continue;
            };

            if let Some(target) = redirect {
                mob.target = Some(target);
                mob.last_retarget = now;
            }

            match mob.kind.temperament() {
                Temperament::Aggressive => update_aggressive(mob, sighting, now, &mut self.rng),
                Temperament::Neutral => update_neutral(mob, now, &mut self.rng),
                Temperament::Timid => update_timid(mob, sighting, now, &mut self.rng),
            }

            if let Some(zone) = self.zones.zone(&mob.zone) {
                mob.step_toward_target(zone);
            }
        }

        self.resolve_mob_collisions();
    }

    /// Push overlapping same-zone pairs apart and deflect their targets
    pub fn resolve_mob_collisions(&mut self) {
        let mut mobs: Vec<&mut Mob> = self.mobs.values_mut().collect();

        for j in 1..mobs.len() {
            let (left, right) = mobs.split_at_mut(j);
            let b = &mut right[0];
            for a in left.iter_mut() {
                if a.zone != b.zone {
                    continue;
                }
                let offset = a.position - b.position;
                let dist_sq = offset.length_squared();
                let min_distance = a.radius + b.radius + MOB_COLLISION_BUFFER;
                if dist_sq <= 0.0 || dist_sq >= min_distance * min_distance {
                    continue;
                }

                let distance = dist_sq.sqrt();
                let normal = offset / distance;
                let shift = (min_distance - distance) * 0.5 * MOB_AVOIDANCE_FORCE;
                a.position += normal * shift;
                b.position -= normal * shift;

                deflect_targets(a, b, normal);
            }
        }

        for mob in self.mobs.values_mut() {
            if let Some(zone) = self.zones.zone(&mob.zone) {
                mob.position = zone.clamp(mob.position);
            }
        }
    }
}

fn deflect_targets(a: &mut Mob, b: &mut Mob, normal: DVec2) {
    let bearing = normal.y.atan2(normal.x);
    let avoid_distance = a.radius + b.radius + 20.0;

    if a.target.is_some_and(|t| a.position.distance(t) > 10.0) {
        a.target = Some(a.position + DVec2::from_angle(bearing + DEFLECTION_ANGLE) * avoid_distance);
    }
    if b.target.is_some_and(|t| b.position.distance(t) > 10.0) {
        b.target = Some(b.position + DVec2::from_angle(bearing - DEFLECTION_ANGLE) * avoid_distance);
    }
}
