//! Movement & Spatial Resolution - per-command player moves
//!
//! A move is resolved in three steps under the world write lock:
//! ```text
//! intent ─► normalize × speed ─► zone clamp ─► soft player separation ─► portal check
//!                                 (gap ⇒ snap to nearest zone center)
//! ```

use glam::DVec2;
use tracing::{info, warn};

use crate::protocol::{PortalTeleport, ServerMessage};
use crate::world::{PlayerId, World, WorldError};
use std::time::Instant;

// ============================================================================
// Validation
// ============================================================================

/// Validate a movement intent and turn it into a unit direction.
/// Returns None for NaN/Inf components or a zero vector.
pub fn normalize_intent(dx: f64, dy: f64) -> Option<DVec2> {
    if !dx.is_finite() || !dy.is_finite() {
        return None;
    }
    let intent = DVec2::new(dx, dy);
    let largest = intent.abs().max_element();
    if largest == 0.0 {
        return None;
    }
    // Pre-scale so huge components cannot overflow the length
    (intent / largest).try_normalize()
}

/// Result of a resolved move
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub position: DVec2,
    pub zone: String,
    pub teleport: Option<PortalTeleport>,
}

impl World {
    /// Apply one movement command. Unknown or dead players and invalid
    /// intents are rejected without touching state.
    pub fn move_player(
        &mut self,
        id: PlayerId,
        dx: f64,
        dy: f64,
        now: Instant,
    ) -> Result<MoveOutcome, WorldError> {
        let direction = normalize_intent(dx, dy).ok_or(WorldError::InvalidIntent)?;
        let player = self.players.get(&id).ok_or(WorldError::UnknownPlayer(id))?;
        if !player.is_alive() {
            return Err(WorldError::PlayerDead(id));
        }

        let previous = player.position;
        let radius = player.radius;
        let candidate = previous + direction * player.speed;

        let (zone_key, clamped) = match self.zones.zone_containing(previous) {
            Some(zone) => (zone.key.clone(), zone.clamp(candidate)),
            None => {
                let zone = self
                    .zones
                    .nearest_zone(previous)
                    .ok_or_else(|| WorldError::UnknownZone(player.current_zone.clone()))?;
                warn!(
                    player_id = id,
                    x = previous.x,
                    y = previous.y,
                    zone = %zone.key,
                    "player outside every zone, snapping to nearest zone"
                );
                (zone.key.clone(), zone.center())
            }
        };

        let mut position = self.separate_from_players(id, &zone_key, clamped, radius);
        if let Some(zone) = self.zones.zone(&zone_key) {
            position = zone.clamp(position);
        }

        let player = self.players.get_mut(&id).ok_or(WorldError::UnknownPlayer(id))?;
        player.position = position;
        player.current_zone = zone_key;

        let teleport = self.try_portal(id, now);
        let player = self.players.get(&id).ok_or(WorldError::UnknownPlayer(id))?;
        Ok(MoveOutcome {
            position: player.position,
            zone: player.current_zone.clone(),
            teleport,
        })
    }

    /// Nudge `position` out of any living same-zone neighbour it overlaps
    fn separate_from_players(
        &self,
        mover: PlayerId,
        zone: &str,
        position: DVec2,
        radius: f64,
    ) -> DVec2 {
        let buffer = self.config.player_separation_buffer;
        let strength = self.config.player_separation_strength;
        let mut position = position;

        for other in self.players.values() {
            if other.id == mover || !other.is_alive() || other.current_zone != zone {
                continue;
            }
            let min_separation = radius + other.radius + buffer;
            let offset = position - other.position;
            let distance = offset.length();
            if distance >= min_separation {
                continue;
            }
            let away = if distance > f64::EPSILON {
                offset / distance
            } else {
                DVec2::X
            };
            let resolved = other.position + away * min_separation;
            position += (resolved - position) * strength;
        }
        position
    }

    /// Teleport the player if it stands on a portal and its cooldown elapsed
    fn try_portal(&mut self, id: PlayerId, now: Instant) -> Option<PortalTeleport> {
        let player = self.players.get(&id)?;
        if !player.portal_ready(now) {
            return None;
        }

        let radius = self.config.portal_radius;
        let portal = self
            .zones
            .portals()
            .find(|p| p.position.distance(player.position) <= radius)?;
        let Some(destination) = self.zones.destination(portal) else {
            warn!(portal = %portal.id, to = %portal.to, "portal destination missing, skipping teleport");
            return None;
        };
        if self.zones.zone(&destination.zone).is_none() {
            warn!(portal = %destination.id, zone = %destination.zone, "portal leads to unknown zone, skipping teleport");
            return None;
        }

        let cooldown = self.config.portal_cooldown();
        let event = PortalTeleport {
            from_portal: portal.id.clone(),
            to_portal: destination.id.clone(),
            from_zone: player.current_zone.clone(),
            to_zone: destination.zone.clone(),
            cooldown: cooldown.as_secs(),
        };
        let arrival = destination.position;

        let player = self.players.get_mut(&id)?;
        player.position = arrival;
        player.current_zone = event.to_zone.clone();
        player.portal_ready_at = Some(now + cooldown);

        info!(
            player_id = id,
            from_portal = %event.from_portal,
            to_portal = %event.to_portal,
            to_zone = %event.to_zone,
            "player teleported"
        );
        self.notify(id, ServerMessage::PortalTeleport(event.clone()));
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::world::{outbound_queue, OutboundReceiver};
    use crate::zones::ZoneTable;
    use std::time::Duration;

    fn world() -> World {
        World::new(WorldConfig::default(), ZoneTable::standard(), Some(1))
    }

    fn join(world: &mut World, at: DVec2) -> (PlayerId, OutboundReceiver) {
        let (tx, rx) = outbound_queue();
        let id = world.add_player(tx, "user", "tester").id;
        world.player_mut(id).unwrap().position = at;
        (id, rx)
    }

    #[test]
    fn test_normalize_intent() {
        assert!(normalize_intent(0.0, 0.0).is_none());
        assert!(normalize_intent(f64::NAN, 1.0).is_none());
        assert!(normalize_intent(1.0, f64::INFINITY).is_none());
        let d = normalize_intent(3.0, 4.0).unwrap();
        assert!((d.length() - 1.0).abs() < 1e-12);
        let huge = normalize_intent(1e300, 1e300).unwrap();
        assert!((huge.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_diagonal_and_axis_moves_equal_speed() {
        let mut world = world();
        let now = Instant::now();
        let (id, _rx) = join(&mut world, DVec2::new(500.0, 500.0));

        let axis = world.move_player(id, 1.0, 0.0, now).unwrap();
        assert!((axis.position.distance(DVec2::new(500.0, 500.0)) - 2.5).abs() < 1e-9);

        let start = axis.position;
        let diag = world.move_player(id, 1.0, 1.0, now).unwrap();
        assert!((diag.position.distance(start) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_move_clamps_to_zone_edge() {
        let mut world = world();
        let now = Instant::now();
        let (id, _rx) = join(&mut world, DVec2::new(999.0, 100.0));
        let outcome = world.move_player(id, 1.0, 0.0, now).unwrap();
        assert_eq!(outcome.position.x, 1000.0);
        assert_eq!(outcome.zone, "common");
    }

    #[test]
    fn test_gap_snaps_to_nearest_zone_center() {
        let mut world = world();
        let now = Instant::now();
        let (id, _rx) = join(&mut world, DVec2::new(1400.0, 500.0));
        let outcome = world.move_player(id, 1.0, 0.0, now).unwrap();
        assert_eq!(outcome.zone, "uncommon");
        assert_eq!(outcome.position, DVec2::new(2000.0, 500.0));
    }

    #[test]
    fn test_rejected_moves_leave_state() {
        let mut world = world();
        let now = Instant::now();
        let (id, _rx) = join(&mut world, DVec2::new(200.0, 200.0));

        assert_eq!(world.move_player(id, 0.0, 0.0, now), Err(WorldError::InvalidIntent));
        assert_eq!(world.move_player(id, f64::NAN, 0.0, now), Err(WorldError::InvalidIntent));
        assert_eq!(world.move_player(777, 1.0, 0.0, now), Err(WorldError::UnknownPlayer(777)));

        world.player_mut(id).unwrap().health = 0;
        assert_eq!(world.move_player(id, 1.0, 0.0, now), Err(WorldError::PlayerDead(id)));
        assert_eq!(world.player(id).unwrap().position, DVec2::new(200.0, 200.0));
    }

    #[test]
    fn test_players_push_apart() {
        let mut world = world();
        let now = Instant::now();
        let (a, _ra) = join(&mut world, DVec2::new(300.0, 300.0));
        let (_b, _rb) = join(&mut world, DVec2::new(320.0, 300.0));

        // Moving toward b ends up closer to the separation point than the raw step
        let outcome = world.move_player(a, 1.0, 0.0, now).unwrap();
        assert!(outcome.position.x < 302.5);
    }

    #[test]
    fn test_dead_neighbours_do_not_push() {
        let mut world = world();
        let now = Instant::now();
        let (a, _ra) = join(&mut world, DVec2::new(300.0, 300.0));
        let (b, _rb) = join(&mut world, DVec2::new(320.0, 300.0));
        world.player_mut(b).unwrap().health = 0;

        let outcome = world.move_player(a, 1.0, 0.0, now).unwrap();
        assert!((outcome.position.x - 302.5).abs() < 1e-9);
    }

    #[test]
    fn test_portal_teleport_and_cooldown() {
        let mut world = world();
        let now = Instant::now();
        let (id, mut rx) = join(&mut world, DVec2::new(700.0, 500.0));

        let outcome = world.move_player(id, 1.0, 0.0, now).unwrap();
        let teleport = outcome.teleport.expect("should teleport");
        assert_eq!(teleport.from_portal, "P1");
        assert_eq!(teleport.to_portal, "P2");
        assert_eq!(teleport.to_zone, "uncommon");
        assert_eq!(teleport.cooldown, 10);
        assert_eq!(outcome.position, DVec2::new(1700.0, 500.0));

        match rx.try_recv().unwrap() {
            ServerMessage::PortalTeleport(event) => assert_eq!(event, teleport),
            other => panic!("unexpected {other:?}"),
        }

        // Standing on P2 within the cooldown does not bounce back
        let later = now + Duration::from_secs(5);
        let outcome = world.move_player(id, -1.0, 0.0, later).unwrap();
        assert!(outcome.teleport.is_none());
        assert_eq!(outcome.zone, "uncommon");

        // After the cooldown, P2 sends the player back to P1
        let after = now + Duration::from_secs(10);
        let outcome = world.move_player(id, 0.0, 1.0, after).unwrap();
        assert_eq!(outcome.teleport.unwrap().to_portal, "P1");
        assert_eq!(outcome.zone, "common");
    }

    #[test]
    fn test_outside_portal_radius_no_teleport() {
        let mut world = world();
        let now = Instant::now();
        let (id, _rx) = join(&mut world, DVec2::new(690.0, 500.0));
        let outcome = world.move_player(id, -1.0, 0.0, now).unwrap();
        assert!(outcome.teleport.is_none());
    }
}
