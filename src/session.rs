//! Per-connection session: one reader loop plus one writer task.
//!
//! The reader decodes client frames and applies them to the world under the
//! write lock. Everything bound for the client (snapshots, notifications,
//! pongs) goes through the connection's bounded queue, which only the
//! writer task drains. A client that stops reading fills its queue and is
//! dropped by the next broadcast.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::{AuthError, AuthenticatedUser};
use crate::metrics::ServerMetrics;
use crate::protocol::{ClientMessage, ProtocolError, ServerMessage};
use crate::world::{outbound_queue, Outbound, PlayerId, SharedWorld, WorldError};

/// Drive one authenticated connection until either side hangs up
pub async fn run_session(
    socket: WebSocket,
    world: SharedWorld,
    metrics: Arc<ServerMetrics>,
    user: AuthenticatedUser,
) {
    let (tx, mut rx) = outbound_queue();

    let player_id = {
        let mut w = world.write();
        let player = w.add_player(tx.clone(), &user.user_id, &user.username);
        if let Some(snapshot) = w.snapshot_for(player.id) {
            let _ = tx.try_send(ServerMessage::State(snapshot));
        }
        player.id
    };
    metrics.connection_opened();

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    warn!(player_id, kind = message.kind(), error = %e, "failed to encode outbound message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientMessage::decode(text.as_str()) {
                Ok(message) => handle_client_message(&world, player_id, message, &tx, Instant::now()),
                Err(e) => debug!(player_id, error = %e, "dropping malformed frame"),
            },
            Ok(Message::Binary(_)) => {
                debug!(player_id, error = %ProtocolError::BinaryFrame, "dropping frame");
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(player_id, error = %e, "websocket read failed");
                break;
            }
        }
    }

    writer.abort();
    world.write().remove_player(player_id);
    metrics.connection_closed();
    info!(player_id, user_id = %user.user_id, "session closed");
}

/// Apply one decoded client message. Rejected commands are no-ops for the
/// client and only show up in the debug log.
pub fn handle_client_message(
    world: &SharedWorld,
    player_id: PlayerId,
    message: ClientMessage,
    outbound: &Outbound,
    now: Instant,
) {
    let result: Result<(), WorldError> = match message {
        ClientMessage::Move { dx, dy } => world.write().move_player(player_id, dx, dy, now).map(|_| ()),
        ClientMessage::Respawn => world.write().respawn_player(player_id),
        ClientMessage::Ping => {
            if outbound.try_send(ServerMessage::Pong).is_err() {
                debug!(player_id, "pong dropped: outbound queue unavailable");
            }
            Ok(())
        }
    };
    if let Err(e) = result {
        debug!(player_id, error = %e, "client command rejected");
    }
}

/// Refuse a connection that failed authentication. No player is created.
pub async fn reject(mut socket: WebSocket, err: AuthError) {
    info!(error = %err, "websocket connection rejected");
    if let Ok(text) = ServerMessage::error(err.to_string()).encode() {
        let _ = socket.send(Message::Text(text.into())).await;
    }
    let _ = socket.send(Message::Close(None)).await;
}
