//! Server Metrics - lock-free counters with Prometheus + JSON export
//!
//! ## Endpoints
//! - `GET /metrics` - Prometheus text format
//! - `GET /metrics/json` - JSON format (live player/mob counts included)

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::ApiState;

/// The periodic world tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Broadcast,
    MobAi,
    Combat,
    Petals,
    Spawn,
}

impl TickKind {
    pub const ALL: [TickKind; 5] = [
        TickKind::Broadcast,
        TickKind::MobAi,
        TickKind::Combat,
        TickKind::Petals,
        TickKind::Spawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TickKind::Broadcast => "broadcast",
            TickKind::MobAi => "mob_ai",
            TickKind::Combat => "combat",
            TickKind::Petals => "petals",
            TickKind::Spawn => "spawn",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Shared metrics state (all lock-free atomics)
#[derive(Debug)]
pub struct ServerMetrics {
    /// Total HTTP requests served
    pub total_requests: AtomicU64,
    /// Total request errors (4xx + 5xx)
    pub total_errors: AtomicU64,
    /// Cumulative request duration in microseconds
    pub total_duration_us: AtomicU64,
    ticks: [AtomicU64; 5],
    pub snapshots_sent: AtomicU64,
    pub send_failures: AtomicU64,
    pub connections_opened: AtomicU64,
    pub connections_closed: AtomicU64,
    /// Milliseconds after `start_time` when the last broadcast finished
    last_broadcast_ms: AtomicU64,
    pub start_time: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_duration_us: AtomicU64::new(0),
            ticks: Default::default(),
            snapshots_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            last_broadcast_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl ServerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, duration_us: u64, is_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_duration_us.fetch_add(duration_us, Ordering::Relaxed);
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_tick(&self, kind: TickKind) {
        self.ticks[kind.index()].fetch_add(1, Ordering::Relaxed);
        if kind == TickKind::Broadcast {
            let elapsed = self.start_time.elapsed().as_millis() as u64;
            self.last_broadcast_ms.store(elapsed, Ordering::Relaxed);
        }
    }

    pub fn ticks(&self, kind: TickKind) -> u64 {
        self.ticks[kind.index()].load(Ordering::Relaxed)
    }

    pub fn record_broadcast(&self, sent: usize, failed: usize) {
        self.snapshots_sent.fetch_add(sent as u64, Ordering::Relaxed);
        self.send_failures.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the last completed broadcast (or since start if none yet)
    pub fn since_last_broadcast(&self) -> Duration {
        let last = Duration::from_millis(self.last_broadcast_ms.load(Ordering::Relaxed));
        self.start_time.elapsed().saturating_sub(last)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn requests_per_second(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed) as f64;
        let uptime = self.uptime_secs();
        if uptime > 0.0 { total / uptime } else { 0.0 }
    }

    pub fn avg_duration_ms(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        let dur_us = self.total_duration_us.load(Ordering::Relaxed);
        if total > 0 {
            (dur_us as f64 / total as f64) / 1000.0
        } else {
            0.0
        }
    }
}

// ============================================================================
// Axum Middleware - request tracking
// ============================================================================

pub async fn metrics_middleware(
    State(state): State<ApiState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let resp = next.run(req).await;
    let duration_us = start.elapsed().as_micros() as u64;
    let is_error = resp.status().is_client_error() || resp.status().is_server_error();

    state.metrics.record_request(duration_us, is_error);
    resp
}

/// Live entity counts, copied out under a short read lock
fn world_counts(state: &ApiState) -> (usize, usize, usize) {
    let world = state.world.read();
    (world.player_count(), world.mob_count(), world.drops().count())
}

// ============================================================================
// GET /metrics - Prometheus text exposition format
// ============================================================================

pub async fn prometheus_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let m = &state.metrics;
    let total_requests = m.total_requests.load(Ordering::Relaxed);
    let total_errors = m.total_errors.load(Ordering::Relaxed);
    let total_dur_us = m.total_duration_us.load(Ordering::Relaxed);
    let snapshots = m.snapshots_sent.load(Ordering::Relaxed);
    let failures = m.send_failures.load(Ordering::Relaxed);
    let opened = m.connections_opened.load(Ordering::Relaxed);
    let closed = m.connections_closed.load(Ordering::Relaxed);
    let uptime = m.uptime_secs();
    let (player_count, mob_count, drop_count) = world_counts(&state);
    let active_sessions = state.sessions.active_count();

    let avg_req_duration_s = if total_requests > 0 {
        (total_dur_us as f64 / total_requests as f64) / 1_000_000.0
    } else {
        0.0
    };

    let mut body = format!(
        "# HELP arena_requests_total Total HTTP requests served\n\
         # TYPE arena_requests_total counter\n\
         arena_requests_total {total_requests}\n\
         \n\
         # HELP arena_request_errors_total Total HTTP request errors (4xx/5xx)\n\
         # TYPE arena_request_errors_total counter\n\
         arena_request_errors_total {total_errors}\n\
         \n\
         # HELP arena_request_duration_seconds Average request duration\n\
         # TYPE arena_request_duration_seconds gauge\n\
         arena_request_duration_seconds {avg_req_duration_s:.6}\n\
         \n\
         # HELP arena_player_count Connected players\n\
         # TYPE arena_player_count gauge\n\
         arena_player_count {player_count}\n\
         \n\
         # HELP arena_mob_count Live mobs across all zones\n\
         # TYPE arena_mob_count gauge\n\
         arena_mob_count {mob_count}\n\
         \n\
         # HELP arena_drop_count Petal drops on the ground\n\
         # TYPE arena_drop_count gauge\n\
         arena_drop_count {drop_count}\n\
         \n\
         # HELP arena_active_sessions Unrevoked login tokens\n\
         # TYPE arena_active_sessions gauge\n\
         arena_active_sessions {active_sessions}\n\
         \n\
         # HELP arena_snapshots_sent_total State frames queued to clients\n\
         # TYPE arena_snapshots_sent_total counter\n\
         arena_snapshots_sent_total {snapshots}\n\
         \n\
         # HELP arena_send_failures_total Frames that hit a closed or full queue\n\
         # TYPE arena_send_failures_total counter\n\
         arena_send_failures_total {failures}\n\
         \n\
         # HELP arena_connections_opened_total Game connections accepted\n\
         # TYPE arena_connections_opened_total counter\n\
         arena_connections_opened_total {opened}\n\
         \n\
         # HELP arena_connections_closed_total Game connections closed\n\
         # TYPE arena_connections_closed_total counter\n\
         arena_connections_closed_total {closed}\n\
         \n\
         # HELP arena_uptime_seconds Server uptime\n\
         # TYPE arena_uptime_seconds gauge\n\
         arena_uptime_seconds {uptime:.2}\n\
         \n\
         # HELP arena_ticks_total Periodic task ticks completed\n\
         # TYPE arena_ticks_total counter\n",
    );
    for kind in TickKind::ALL {
        body.push_str(&format!(
            "arena_ticks_total{{task=\"{}\"}} {}\n",
            kind.as_str(),
            m.ticks(kind)
        ));
    }

    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

// ============================================================================
// GET /metrics/json
// ============================================================================

#[derive(Serialize)]
pub struct TickCounts {
    pub broadcast: u64,
    pub mob_ai: u64,
    pub combat: u64,
    pub petals: u64,
    pub spawn: u64,
}

#[derive(Serialize)]
pub struct JsonMetrics {
    pub uptime_secs: f64,
    pub player_count: usize,
    pub mob_count: usize,
    pub drop_count: usize,
    pub active_sessions: usize,
    pub ticks: TickCounts,
    pub snapshots_sent: u64,
    pub send_failures: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub secs_since_broadcast: f64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub rps: f64,
    pub avg_request_duration_ms: f64,
}

pub async fn json_metrics_handler(State(state): State<ApiState>) -> Json<JsonMetrics> {
    let m = &state.metrics;
    let (player_count, mob_count, drop_count) = world_counts(&state);

    Json(JsonMetrics {
        uptime_secs: m.uptime_secs(),
        player_count,
        mob_count,
        drop_count,
        active_sessions: state.sessions.active_count(),
        ticks: TickCounts {
            broadcast: m.ticks(TickKind::Broadcast),
            mob_ai: m.ticks(TickKind::MobAi),
            combat: m.ticks(TickKind::Combat),
            petals: m.ticks(TickKind::Petals),
            spawn: m.ticks(TickKind::Spawn),
        },
        snapshots_sent: m.snapshots_sent.load(Ordering::Relaxed),
        send_failures: m.send_failures.load(Ordering::Relaxed),
        connections_opened: m.connections_opened.load(Ordering::Relaxed),
        connections_closed: m.connections_closed.load(Ordering::Relaxed),
        secs_since_broadcast: m.since_last_broadcast().as_secs_f64(),
        total_requests: m.total_requests.load(Ordering::Relaxed),
        total_errors: m.total_errors.load(Ordering::Relaxed),
        rps: m.requests_per_second(),
        avg_request_duration_ms: m.avg_duration_ms(),
    })
}

// ============================================================================
// Tests
// ============================================================================
