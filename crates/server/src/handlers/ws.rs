// WebSocket endpoint for room participants.
// A socket must send `room:join` first; afterwards its events are routed by the
// room registry and it receives directed events plus room-wide broadcasts.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use pairlab_sync::protocol::{ClientEvent, ServerEvent};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::services::rooms::{Connection, JoinRequest, Member, RoomBroadcast};
use crate::AppState;

type WsSink = SplitSink<WebSocket, Message>;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.config.channel_capacity);
    let conn = Connection::new(tx);
    debug!(conn_id = %conn.id, "socket opened");

    // Until the socket is seated, replies are written inline.
    let (member, room_rx) = loop {
        let Some(Ok(msg)) = receiver.next().await else {
            debug!(conn_id = %conn.id, "socket closed before joining");
            return;
        };
        let joined = match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::JoinRoom {
                    room_id,
                    invite_code,
                    user_id,
                    user_name,
                    role,
                }) => {
                    let request = JoinRequest {
                        room_id,
                        invite_code,
                        user_id,
                        user_name,
                        role,
                    };
                    state.rooms.join(&conn, request).await
                }
                Ok(other) => {
                    debug!(event = other.name(), "event before join");
                    reject(&conn, "join a room first");
                    None
                }
                Err(err) => {
                    reject(&conn, &format!("malformed event: {err}"));
                    None
                }
            },
            Message::Close(_) => return,
            _ => None,
        };

        while let Ok(event) = rx.try_recv() {
            if send_event(&mut sender, &event).await.is_err() {
                return;
            }
        }
        if let Some(joined) = joined {
            break joined;
        }
    };

    let conn_id = conn.id;
    let forward_task = tokio::spawn(forward(sender, rx, room_rx, conn_id));

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => state.rooms.dispatch(&member, event).await,
                Err(err) => {
                    warn!(conn_id = %conn_id, %err, "malformed event");
                    reject(&conn, &format!("malformed event: {err}"));
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.rooms.leave(&member).await;
    forward_task.abort();
    info!(conn_id = %conn_id, user_id = %member.user_id, "socket closed");
}

/// Write directed and room-wide events to the socket.
async fn forward(
    mut sender: WsSink,
    mut rx: mpsc::Receiver<ServerEvent>,
    mut room_rx: broadcast::Receiver<RoomBroadcast>,
    conn_id: uuid::Uuid,
) {
    loop {
        let event = tokio::select! {
            Some(event) = rx.recv() => event,
            published = room_rx.recv() => match published {
                Ok(RoomBroadcast { from, event }) if from != conn_id => event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(conn_id = %conn_id, skipped, "room broadcast lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            else => break,
        };
        if send_event(&mut sender, &event).await.is_err() {
            break;
        }
    }
}

async fn send_event(sender: &mut WsSink, event: &ServerEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(err) => {
            error!(%err, event = event.name(), "failed to encode event");
            Ok(())
        }
    }
}

fn reject(conn: &Connection, message: &str) {
    let _ = conn.tx.try_send(ServerEvent::Error {
        message: message.to_string(),
    });
}
