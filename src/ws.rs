//! Per-room WebSocket subscription endpoint.
//!
//! The socket is read-mostly: the first frame is an authoritative
//! snapshot, then room events stream in publish order. Actions arrive
//! over HTTP only. A lagging subscriber gets a fresh snapshot instead
//! of a gap.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::GameError;
use crate::protocol::ServerFrame;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: String,
    /// Known player id, if the subscriber is a player and not a bare
    /// spectator; drives the connection flag.
    pub player: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !state.room_exists(&params.room).await {
        return GameError::room_not_found(&params.room).into_response();
    }

    tracing::info!(
        "WebSocket subscribe: room={}, player={:?}",
        params.room,
        params.player
    );
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let room = params.room;
    // Subscribe before snapshotting so nothing published in between is
    // lost; an event the snapshot already reflects is harmless to
    // re-apply on the client.
    let mut events = state.channels.subscribe(&room);

    let (mut sender, mut receiver) = socket.split();

    if send_snapshot(&mut sender, &state, &room).await.is_err() {
        return;
    }

    if let Some(player_id) = &params.player {
        state.set_connected(&room, player_id, true).await;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    // Fell behind the channel; replaying is impossible,
                    // so reconcile with a fresh snapshot.
                    tracing::warn!(
                        "Room {}: subscriber lagged by {} events, re-snapshotting",
                        room,
                        missed
                    );
                    if send_snapshot(&mut sender, &state, &room).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    // Room retired.
                    break;
                }
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // Actions go over HTTP; stray frames are ignored.
                }
                Some(Err(e)) => {
                    tracing::debug!("WebSocket error: {}", e);
                    break;
                }
            },
        }
    }

    if let Some(player_id) = &params.player {
        state.set_connected(&room, player_id, false).await;
    }
    tracing::info!("WebSocket closed: room={}", room);
}

async fn send_snapshot(
    sender: &mut (impl SinkExt<Message> + Unpin),
    state: &Arc<AppState>,
    room: &str,
) -> Result<(), ()> {
    let snapshot = match state.snapshot(room).await {
        Ok(snapshot) => snapshot,
        // Room retired while we were attaching.
        Err(_) => return Err(()),
    };
    let frame = ServerFrame::Snapshot { snapshot };
    let json = serde_json::to_string(&frame).map_err(|_| ())?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
