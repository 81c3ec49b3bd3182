//! Tick Scheduler - the fixed set of periodic world tasks
//!
//! ```text
//! broadcast  (16 ms)  snapshot per player, queue, drop dead connections
//! mob_ai     (100 ms) behaviours + mob-mob separation
//! combat     (100 ms) player/mob contact, dead mob removal
//! petals     (100 ms) orbit, heal, petal combat, drop expiry and pickup
//! spawn      (5 s)    top up zone populations
//! watchdog   (1 s)    warn when broadcasts stall
//! ```
//!
//! Each task takes the world lock for one synchronous step and releases it
//! before awaiting. A panicking task is not restarted.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::config::ServerConfig;
use crate::loot::KnockedOut;
use crate::metrics::{ServerMetrics, TickKind};
use crate::protocol::ServerMessage;
use crate::world::SharedWorld;

const WATCHDOG_PERIOD: Duration = Duration::from_secs(1);

/// Handles to the running periodic tasks
#[derive(Debug, Default)]
pub struct WorldTasks {
    tasks: Vec<(&'static str, AbortHandle)>,
}

impl WorldTasks {
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tasks.iter().map(|(name, _)| *name)
    }

    pub fn abort_all(&self) {
        for (name, handle) in &self.tasks {
            debug!(task = name, "aborting world task");
            handle.abort();
        }
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Watch a task and report how it ended
fn supervise(name: &'static str, handle: JoinHandle<()>, tasks: &mut WorldTasks) {
    tasks.tasks.push((name, handle.abort_handle()));
    tokio::spawn(async move {
        match handle.await {
            Ok(()) => info!(task = name, "world task finished"),
            Err(e) if e.is_panic() => {
                error!(task = name, error = %e, "world task panicked; subsystem halted")
            }
            Err(_) => debug!(task = name, "world task cancelled"),
        }
    });
}

/// Start every periodic task against `world`
pub fn spawn_world_tasks(
    world: SharedWorld,
    config: &ServerConfig,
    metrics: Arc<ServerMetrics>,
) -> WorldTasks {
    let mut tasks = WorldTasks::default();
    let ticks = &config.ticks;

    {
        let world = world.clone();
        let metrics = metrics.clone();
        let mut t = ticker(ticks.broadcast());
        supervise(
            "broadcast",
            tokio::spawn(async move {
                loop {
                    t.tick().await;
                    broadcast_once(&world, &metrics);
                }
            }),
            &mut tasks,
        );
    }

    {
        let world = world.clone();
        let metrics = metrics.clone();
        let mut t = ticker(ticks.mob_ai());
        supervise(
            "mob_ai",
            tokio::spawn(async move {
                loop {
                    t.tick().await;
                    world.write().update_mobs(Instant::now());
                    metrics.record_tick(TickKind::MobAi);
                }
            }),
            &mut tasks,
        );
    }

    {
        let world = world.clone();
        let metrics = metrics.clone();
        let mut t = ticker(ticks.combat());
        supervise(
            "combat",
            tokio::spawn(async move {
                loop {
                    t.tick().await;
                    let report = world.write().combat_tick(Instant::now());
                    if !report.players_killed.is_empty() || !report.mobs_removed.is_empty() {
                        debug!(
                            players_killed = report.players_killed.len(),
                            mobs_removed = report.mobs_removed.len(),
                            "combat tick"
                        );
                    }
                    metrics.record_tick(TickKind::Combat);
                }
            }),
            &mut tasks,
        );
    }

    {
        let world = world.clone();
        let metrics = metrics.clone();
        let revive_delay = config.world.petal_revive_delay();
        let mut t = ticker(ticks.petals());
        supervise(
            "petals",
            tokio::spawn(async move {
                let mut last = Instant::now();
                loop {
                    t.tick().await;
                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f64();
                    last = now;
                    let report = world.write().update_petals(now, dt);
                    for knocked in report.knocked_out {
                        schedule_revive(world.clone(), knocked, revive_delay);
                    }
                    metrics.record_tick(TickKind::Petals);
                }
            }),
            &mut tasks,
        );
    }

    {
        let world = world.clone();
        let metrics = metrics.clone();
        let mut t = ticker(ticks.spawn());
        supervise(
            "spawn",
            tokio::spawn(async move {
                loop {
                    t.tick().await;
                    let spawned = world.write().spawn_mobs(Instant::now());
                    trace!(spawned, "spawn tick");
                    metrics.record_tick(TickKind::Spawn);
                }
            }),
            &mut tasks,
        );
    }

    {
        let threshold = ticks.stall_threshold();
        let mut t = ticker(WATCHDOG_PERIOD);
        supervise(
            "watchdog",
            tokio::spawn(async move {
                let mut stalled = false;
                loop {
                    t.tick().await;
                    stalled = check_broadcast_stall(&metrics, threshold, stalled);
                }
            }),
            &mut tasks,
        );
    }

    let names: Vec<&str> = tasks.names().collect();
    info!(count = names.len(), tasks = ?names, "world tasks started");
    tasks
}

/// Bring a knocked-out petal back after `delay`
pub fn schedule_revive(world: SharedWorld, knocked: KnockedOut, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = world.write().revive_petal(knocked.owner_id, knocked.petal_id) {
            debug!(player_id = knocked.owner_id, petal_id = knocked.petal_id, error = %e, "petal revive skipped");
        }
    })
}

/// One broadcast pass. Returns how many snapshots were queued.
///
/// Players whose queue is closed or full are removed; the others are
/// unaffected. A full queue means the client stopped reading.
pub fn broadcast_once(world: &SharedWorld, metrics: &ServerMetrics) -> usize {
    let frames = world.read().collect_frames();

    let mut sent = 0;
    let mut failed = Vec::new();
    for frame in frames {
        match frame.outbound.try_send(ServerMessage::State(frame.snapshot)) {
            Ok(()) => sent += 1,
            Err(e) => {
                let reason = match e {
                    TrySendError::Full(_) => "full",
                    TrySendError::Closed(_) => "closed",
                };
                failed.push((frame.player_id, reason));
            }
        }
    }

    if !failed.is_empty() {
        let mut w = world.write();
        for (id, reason) in &failed {
            if w.remove_player(*id).is_some() {
                warn!(player_id = id, reason = *reason, "outbound queue unusable, player removed");
            }
        }
    }

    metrics.record_broadcast(sent, failed.len());
    metrics.record_tick(TickKind::Broadcast);
    sent
}

/// Returns the new stalled flag. Warns once per stall, logs recovery.
fn check_broadcast_stall(metrics: &ServerMetrics, threshold: Duration, was_stalled: bool) -> bool {
    let since = metrics.since_last_broadcast();
    let stalled = since > threshold;
    if stalled && !was_stalled {
        warn!(
            secs_since_broadcast = since.as_secs_f64(),
            threshold_secs = threshold.as_secs_f64(),
            "broadcast stalled; world lock may be contended"
        );
    } else if !stalled && was_stalled {
        info!("broadcast recovered");
    }
    stalled
}
