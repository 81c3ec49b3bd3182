//! Spawning - mob population top-up and safe player spawn points

use glam::DVec2;
use rand::Rng;
use std::time::Instant;
use tracing::{debug, warn};

use crate::mob::{MobBlueprint, MobType};
use crate::world::World;
use crate::zones::{Zone, STARTING_ZONE};

/// Candidate points tried before settling for an unsafe player spawn
const PLAYER_SPAWN_ATTEMPTS: usize = 20;

fn random_point_in<R: Rng + ?Sized>(zone: &Zone, rng: &mut R) -> DVec2 {
    DVec2::new(
        rng.gen_range(zone.min_x..=zone.max_x),
        rng.gen_range(zone.min_y..=zone.max_y),
    )
}

impl World {
    /// Top up every zone toward the population cap. Returns the number of
    /// mobs placed this cycle.
    pub fn spawn_mobs(&mut self, now: Instant) -> usize {
        let zones: Vec<Zone> = self.zones.zones().to_vec();
        let mut spawned = 0;
        for zone in &zones {
            spawned += self.populate_zone(zone, now);
        }
        if spawned > 0 {
            debug!(spawned, total = self.mobs.len(), "spawn cycle complete");
        }
        spawned
    }

    fn populate_zone(&mut self, zone: &Zone, now: Instant) -> usize {
        let cap = self.config.mob_cap_per_zone;
        let population = self.zone_population(&zone.key);
        if population >= cap {
            return 0;
        }

        let mut needed = cap - population;
        let mut attempts = 0;
        let mut placed = 0;
        let max_attempts = self.config.spawn_attempts_per_cycle;
        let batch_max = self.config.spawn_batch_max.max(1);

        while needed > 0 && attempts < max_attempts {
            let kind = MobType::random(&mut self.rng);
            let batch = self.rng.gen_range(1..=batch_max).min(needed);

            for _ in 0..batch {
                if attempts >= max_attempts {
                    break;
                }
                attempts += 1;

                let blueprint = MobBlueprint::roll(kind, &zone.key, &mut self.rng);
                let candidate = random_point_in(zone, &mut self.rng);
                let exclusion = blueprint.radius * self.config.spawn_exclusion_factor;
                if !self.clear_of_players(candidate, exclusion) {
                    continue;
                }

                if self.insert_mob(&blueprint, &zone.key, candidate, now).is_ok() {
                    needed -= 1;
                    placed += 1;
                }
            }
        }

        if needed > 0 {
            debug!(zone = %zone.key, missing = needed, attempts, "spawn attempts exhausted");
        }
        placed
    }

    fn clear_of_players(&self, point: DVec2, exclusion: f64) -> bool {
        self.players
            .values()
            .filter(|p| p.is_alive())
            .all(|p| p.position.distance(point) > exclusion)
    }

    /// A point on the left strip of the starting zone, away from mobs when possible
    pub fn safe_player_spawn(&mut self) -> DVec2 {
        let Some(zone) = self.zones.zone(STARTING_ZONE).cloned() else {
            warn!(zone = STARTING_ZONE, "starting zone missing, spawning at origin");
            return DVec2::ZERO;
        };
        let max_x = (zone.min_x + self.config.player_spawn_width).min(zone.max_x);
        let clearance = self.config.player_spawn_mob_clearance;

        let mut candidate = zone.center();
        for _ in 0..PLAYER_SPAWN_ATTEMPTS {
            candidate = DVec2::new(
                self.rng.gen_range(zone.min_x..=max_x),
                self.rng.gen_range(zone.min_y..=zone.max_y),
            );
            let safe = self
                .mobs
                .values()
                .filter(|m| m.zone == zone.key)
                .all(|m| m.position.distance(candidate) > clearance + m.radius);
            if safe {
                return candidate;
            }
        }
        debug!("no mob-free spawn point found, using last candidate");
        candidate
    }
}
