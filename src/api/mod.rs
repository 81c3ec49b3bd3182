//! HTTP + WebSocket API Layer
//!
//! ## Architecture
//! ```text
//! Browser client
//!       ↓ HTTP (JSON)            ↓ WebSocket (JSON frames)
//! /api/register, /api/login,   /ws?token=...
//! /api/logout
//!       ↓                        ↓
//! UserRepo + SessionStore  →  session::run_session
//!                                ↓
//!                         SharedWorld (Arc<RwLock<World>>)
//! ```
//!
//! Operational endpoints: `/health`, `/metrics`, `/metrics/json`.

pub mod auth;
pub mod ws;

use axum::{
    extract::State,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::SessionStore;
use crate::metrics::ServerMetrics;
use crate::storage::repository::UserRepo;
use crate::world::SharedWorld;

/// Shared state available to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// The live world; handlers take the lock briefly and never across an await
    pub world: SharedWorld,
    pub users: Arc<dyn UserRepo>,
    pub sessions: Arc<SessionStore>,
    /// Server-wide metrics (lock-free atomics)
    pub metrics: Arc<ServerMetrics>,
}

impl ApiState {
    pub fn new(
        world: SharedWorld,
        users: Arc<dyn UserRepo>,
        sessions: Arc<SessionStore>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            world,
            users,
            sessions,
            metrics,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    players: usize,
}

async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let players = state.world.read().player_count();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        players,
    })
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the full router: auth, game socket, health and metrics
pub fn build_router(state: ApiState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(crate::metrics::prometheus_handler))
        .route("/metrics/json", get(crate::metrics::json_metrics_handler))
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

/// Serve the router on an already-bound listener
pub async fn serve(listener: TcpListener, state: ApiState, allowed_origins: &[String]) -> std::io::Result<()> {
    let app = build_router(state, allowed_origins);
    axum::serve(listener, app).await
}

/// Bind `addr` and serve until the task is dropped
pub async fn start_api_server(state: ApiState, addr: &str, allowed_origins: &[String]) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "API server listening");
    serve(listener, state, allowed_origins).await
}
