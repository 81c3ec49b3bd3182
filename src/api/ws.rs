//! GET /ws?token=... - upgrade to the game socket

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;

use super::ApiState;
use crate::auth::authenticate;
use crate::session::{reject, run_session};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// The token is checked before the upgrade completes; a failed check still
/// upgrades so the client receives an `error` frame before the close.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<ApiState>,
) -> Response {
    let auth = authenticate(state.users.as_ref(), &state.sessions, query.token.as_deref()).await;
    ws.on_upgrade(move |socket| async move {
        match auth {
            Ok(user) => run_session(socket, state.world, state.metrics, user).await,
            Err(err) => reject(socket, err).await,
        }
    })
}
