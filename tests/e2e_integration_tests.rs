//! End-to-End Integration Tests
//!
//! Walks one player through the full loop: spawn → move → portal → kill a
//! mob → loot drop → drop expiry, plus petal pickup and timed revive.
//! Also runs a real WebSocket session against a bound listener.

use glam::DVec2;
use std::sync::Arc;
use std::time::{Duration, Instant};

use petal_arena_server::api::{self, ApiState};
use petal_arena_server::auth::SessionStore;
use petal_arena_server::config::WorldConfig;
use petal_arena_server::loot::KnockedOut;
use petal_arena_server::metrics::ServerMetrics;
use petal_arena_server::mob::{MobBlueprint, MobType, Rarity};
use petal_arena_server::protocol::ServerMessage;
use petal_arena_server::scheduler;
use petal_arena_server::storage::memory::InMemoryUserRepo;
use petal_arena_server::storage::repository::UserRepo;
use petal_arena_server::world::{outbound_queue, World};
use petal_arena_server::zones::ZoneTable;

fn new_world() -> World {
    World::new(WorldConfig::default(), ZoneTable::standard(), Some(42))
}

// ============================================================================
// Full Pipeline: spawn → clamp → portal → kill → drop → expiry
// ============================================================================

#[test]
fn test_full_player_pipeline() {
    let mut world = new_world();
    let (tx, mut rx) = outbound_queue();
    let t0 = Instant::now();

    // Step 1: spawn in the common zone at full health
    let player = world.add_player(tx, "user-1", "alice");
    let id = player.id;
    assert_eq!(player.current_zone, "common");
    assert_eq!(player.health, player.max_health);
    let common = world.zones().zone("common").unwrap().clone();
    assert!(common.contains(player.position));

    // Step 2: walk right along y=100 (away from P1) until clamped at max-x
    world.player_mut(id).unwrap().position = DVec2::new(900.0, 100.0);
    let mut prev_x = 900.0;
    let mut clamped_steps = 0;
    for _ in 0..100 {
        let outcome = world.move_player(id, 1.0, 0.0, t0).unwrap();
        assert!(outcome.teleport.is_none());
        assert!(common.contains(outcome.position));
        assert_eq!(outcome.position.y, 100.0);
        let x = outcome.position.x;
        if prev_x < common.max_x {
            assert!(x > prev_x, "x went from {prev_x} to {x} before reaching the edge");
        } else {
            assert_eq!(x, common.max_x);
            clamped_steps += 1;
        }
        prev_x = x;
    }
    assert_eq!(prev_x, common.max_x);
    assert!(clamped_steps > 0);

    // Step 3: step next to P1 and get carried to P2
    world.player_mut(id).unwrap().position = DVec2::new(850.0, 500.0);
    let outcome = world.move_player(id, -1.0, 0.0, t0).unwrap();
    let teleport = outcome.teleport.expect("expected a teleport");
    assert_eq!(teleport.from_portal, "P1");
    assert_eq!(teleport.to_portal, "P2");
    assert_eq!(teleport.cooldown, 10);
    assert_eq!(outcome.zone, "uncommon");
    assert_eq!(outcome.position, world.zones().portal("P2").unwrap().position);
    assert!(matches!(rx.try_recv(), Ok(ServerMessage::PortalTeleport(_))));

    // Step 4: a common goblin sitting on the player trades blows until it dies
    let blueprint = MobBlueprint::with_rarity(MobType::Goblin, Rarity::Common, 0.0);
    assert_eq!((blueprint.health, blueprint.damage), (30, 8));
    let here = world.player(id).unwrap().position;
    let mob_id = world.insert_mob(&blueprint, "uncommon", here, t0).unwrap();
    let hit = world.player(id).unwrap().collision_damage;
    assert!(hit < blueprint.health && 2 * hit >= blueprint.health);

    let report = world.combat_tick(t0 + Duration::from_millis(200));
    assert_eq!((report.hits_on_players, report.hits_on_mobs), (1, 1));
    assert!(report.mobs_removed.is_empty());
    assert_eq!(world.mob(mob_id).unwrap().health, blueprint.health - hit);
    assert_eq!(world.player(id).unwrap().health, 100 - blueprint.damage);

    let t1 = t0 + Duration::from_millis(400);
    let report = world.combat_tick(t1);
    assert_eq!(report.mobs_removed, vec![mob_id]);
    assert!(world.mob(mob_id).is_none());
    assert_eq!(world.player(id).unwrap().health, 100 - 2 * blueprint.damage);

    // Step 5: the next snapshot has no mob and exactly one drop, owned by the killer
    let snapshot = world.snapshot_for(id).unwrap();
    assert!(snapshot.mobs.iter().all(|m| m.id != mob_id));
    assert_eq!(snapshot.drops.len(), 1);
    let drop = &snapshot.drops[0];
    assert_eq!(drop.owner_id, id);
    assert_eq!(drop.kind, MobType::Goblin.loot());
    assert_eq!((drop.x, drop.y), (here.x, here.y));

    let notices: Vec<&'static str> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|m| m.kind())
        .collect();
    assert!(notices.contains(&"mob_killed"));
    assert!(notices.contains(&"petal_drop_created"));

    // Step 6: the drop vanishes once its lifetime has passed
    let drop_id = drop.id;
    assert!(world.expire_drops(t1 + Duration::from_secs(30)).is_empty());
    assert_eq!(world.expire_drops(t1 + Duration::from_millis(30_001)), vec![drop_id]);
    assert!(world.snapshot_for(id).unwrap().drops.is_empty());
}

#[test]
fn test_portal_cooldown_then_onward_teleport() {
    let mut world = new_world();
    let (tx, _rx) = outbound_queue();
    let id = world.add_player(tx, "user-1", "alice").id;
    let t0 = Instant::now();

    world.player_mut(id).unwrap().position = DVec2::new(850.0, 500.0);
    assert!(world.move_player(id, -1.0, 0.0, t0).unwrap().teleport.is_some());

    // P3 is in range of the new zone but the cooldown holds
    world.player_mut(id).unwrap().position = DVec2::new(2250.0, 500.0);
    let blocked = world.move_player(id, 1.0, 0.0, t0 + Duration::from_secs(5)).unwrap();
    assert!(blocked.teleport.is_none());
    assert_eq!(blocked.zone, "uncommon");

    let moved = world.move_player(id, 1.0, 0.0, t0 + Duration::from_secs(11)).unwrap();
    assert_eq!(moved.teleport.unwrap().to_portal, "P4");
    assert_eq!(moved.zone, "rare");
}

// ============================================================================
// Petals: pickup → knockout → timed revive
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_petal_pickup_and_timed_revive() {
    let world = new_world().into_shared();
    let (tx, mut rx) = outbound_queue();
    let now = Instant::now();

    let (id, petal_id) = {
        let mut w = world.write();
        let player = w.add_player(tx, "user-1", "alice");
        let drop_id = w.insert_drop(MobType::Wolf.loot(), player.position, player.id, "common", now);
        let petal_id = w.pickup_drop(drop_id, player.id, now).unwrap();
        (player.id, petal_id)
    };
    assert!(matches!(rx.try_recv(), Ok(ServerMessage::PetalPickedUp(_))));

    {
        let mut w = world.write();
        let petal = w.player_mut(id).unwrap().petals.get_mut(&petal_id).unwrap();
        assert!(petal.take_damage(i32::MAX));
        assert!(!petal.active);
    }

    let delay = WorldConfig::default().petal_revive_delay();
    let handle = scheduler::schedule_revive(
        world.clone(),
        KnockedOut { owner_id: id, petal_id },
        delay,
    );

    tokio::time::sleep(delay / 2).await;
    assert!(!world.read().player(id).unwrap().petals[&petal_id].active);

    handle.await.unwrap();
    let w = world.read();
    let petal = &w.player(id).unwrap().petals[&petal_id];
    assert!(petal.active);
    assert_eq!(petal.health, petal.max_health);
    drop(w);
    assert!(matches!(rx.try_recv(), Ok(ServerMessage::PetalRespawned { .. })));
}

// ============================================================================
// WebSocket session over a real listener
// ============================================================================

#[tokio::test]
async fn test_websocket_session_lifecycle() {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let world = new_world().into_shared();
    let users = Arc::new(InMemoryUserRepo::new());
    let sessions = Arc::new(SessionStore::new());
    let user = users.create_user("alice", "secret1").await.unwrap();
    let token = sessions.issue(&user.id);
    let state = ApiState::new(world.clone(), users, sessions, ServerMetrics::new());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move { api::serve(listener, state, &[]).await });

    let url = format!("ws://{addr}/ws?token={token}");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    // First frame is the initial state
    let first = socket.next().await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
    assert_eq!(json["type"], "state");
    assert_eq!(json["data"]["your_zone"], "common");
    assert_eq!(world.read().player_count(), 1);

    // Malformed frames are dropped, the connection stays up
    socket.send(Message::text("not json")).await.unwrap();
    socket.send(Message::text(r#"{"type":"ping"}"#)).await.unwrap();
    let pong = socket.next().await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(pong.to_text().unwrap()).unwrap();
    assert_eq!(json["type"], "pong");

    socket.close(None).await.unwrap();
    for _ in 0..50 {
        if world.read().player_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(world.read().player_count(), 0);
    server.abort();
}

#[tokio::test]
async fn test_websocket_rejects_bad_token() {
    use futures_util::StreamExt;

    let world = new_world().into_shared();
    let state = ApiState::new(
        world.clone(),
        Arc::new(InMemoryUserRepo::new()),
        Arc::new(SessionStore::new()),
        ServerMetrics::new(),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move { api::serve(listener, state, &[]).await });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?token=nope"))
        .await
        .unwrap();
    let frame = socket.next().await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(world.read().player_count(), 0);
    server.abort();
}
