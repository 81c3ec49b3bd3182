use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, Instant};

use petal_arena_server::config::WorldConfig;
use petal_arena_server::metrics::ServerMetrics;
use petal_arena_server::petal::PetalType;
use petal_arena_server::scheduler::broadcast_once;
use petal_arena_server::world::{outbound_queue, OutboundReceiver, World};
use petal_arena_server::zones::ZoneTable;

/// A world with full mob populations and `players` connected players,
/// each carrying a few petals
fn populated_world(players: usize) -> (World, Vec<OutboundReceiver>) {
    let mut world = World::new(WorldConfig::default(), ZoneTable::standard(), Some(0xA11CE));
    let now = Instant::now();
    world.spawn_mobs(now);
    world.spawn_mobs(now);
    world.spawn_mobs(now);
    world.spawn_mobs(now);

    let mut receivers = Vec::with_capacity(players);
    for i in 0..players {
        let (tx, rx) = outbound_queue();
        let player = world.add_player(tx, &format!("user-{i}"), &format!("player{i}"));
        for kind in [PetalType::Wolf, PetalType::Goblin, PetalType::Orc] {
            let drop_id = world.insert_drop(kind, player.position, player.id, &player.current_zone, now);
            let _ = world.pickup_drop(drop_id, player.id, now);
        }
        receivers.push(rx);
    }
    (world, receivers)
}

fn bench_simulation_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_tick");
    for players in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::new("mob_ai", players), &players, |b, &n| {
            let (mut world, _rx) = populated_world(n);
            b.iter(|| world.update_mobs(black_box(Instant::now())));
        });
        group.bench_with_input(BenchmarkId::new("combat", players), &players, |b, &n| {
            let (mut world, _rx) = populated_world(n);
            b.iter(|| black_box(world.combat_tick(Instant::now())));
        });
        group.bench_with_input(BenchmarkId::new("petals", players), &players, |b, &n| {
            let (mut world, _rx) = populated_world(n);
            b.iter(|| black_box(world.update_petals(Instant::now(), 0.1)));
        });
    }
    group.finish();
}

fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");
    group.measurement_time(Duration::from_secs(5));
    for players in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(players), &players, |b, &n| {
            let (world, mut receivers) = populated_world(n);
            let world = world.into_shared();
            let metrics = ServerMetrics::new();
            b.iter(|| {
                let sent = broadcast_once(&world, &metrics);
                for rx in receivers.iter_mut() {
                    while rx.try_recv().is_ok() {}
                }
                black_box(sent)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_simulation_ticks, bench_broadcast);
criterion_main!(benches);
