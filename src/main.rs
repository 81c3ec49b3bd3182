use std::sync::Arc;
use tracing::{error, info};

use petal_arena_server::{
    api::{self, ApiState},
    auth::SessionStore,
    config::ServerConfig,
    logging,
    scheduler,
    storage::memory::InMemoryUserRepo,
    ServerMetrics, World, ZoneTable,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    logging::init_tracing(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "starting Petal Arena server");

    // ========================================================================
    // 1. World and periodic tasks
    // ========================================================================
    let zones = ZoneTable::standard();
    zones.validate()?;
    info!(zones = zones.zones().len(), portals = zones.portals().count(), "zone table loaded");

    let world = World::new(config.world.clone(), zones, config.seed).into_shared();
    let metrics = ServerMetrics::new();
    let tasks = scheduler::spawn_world_tasks(world.clone(), &config, metrics.clone());

    // ========================================================================
    // 2. Accounts and HTTP/WebSocket API
    // ========================================================================
    let state = ApiState::new(
        world,
        Arc::new(InMemoryUserRepo::new()),
        Arc::new(SessionStore::new()),
        metrics,
    );
    let addr = config.bind_address();
    let origins = config.network.allowed_origins.clone();

    tokio::select! {
        result = api::start_api_server(state, &addr, &origins) => {
            if let Err(e) = &result {
                error!(error = %e, "API server stopped");
            }
            tasks.abort_all();
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            tasks.abort_all();
        }
    }

    Ok(())
}
