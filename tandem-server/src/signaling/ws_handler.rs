use crate::AppState;
use crate::room::{ConnectionId, RoomCommand};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tandem_core::{ErrorCode, PeerId, RoomId, SignalMessage};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(peer_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let peer_id: PeerId = match peer_id.parse() {
        Ok(id) => id,
        Err(e) => {
            warn!("Rejecting WebSocket upgrade: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, peer_id, state))
}

async fn handle_socket(socket: WebSocket, peer_id: PeerId, state: Arc<AppState>) {
    info!("New WebSocket connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let connection = state.signaling.add_peer(peer_id, tx);

    state.signaling.send_signal_now(
        &peer_id,
        &SignalMessage::IceConfig {
            ice_servers: state.signaling.get_ice_servers(),
        },
    );

    let current_room: Arc<Mutex<Option<RoomId>>> = Arc::new(Mutex::new(None));

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sender.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let session = ClientSession {
            state: state.clone(),
            peer_id,
            connection,
            room: current_room.clone(),
        };

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(signal) => session.handle_signal(signal).await,
                        Err(e) => {
                            warn!("Invalid SignalMessage from {}: {}", peer_id, e);
                            session.reject(ErrorCode::InvalidMessage, e.to_string());
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Either side may have ended the socket; the room is left exactly once here.
    let room = current_room.lock().await.take();
    if let Some(room_id) = room {
        state
            .room_manager
            .dispatch(
                &room_id,
                RoomCommand::Leave {
                    peer_id,
                    connection,
                },
            )
            .await;
    }

    state.signaling.remove_peer(&peer_id, connection);
    info!("WebSocket disconnected: {} ({})", peer_id, connection);
}

/// What one socket knows about itself: its peer, and the room it sits in.
struct ClientSession {
    state: Arc<AppState>,
    peer_id: PeerId,
    connection: ConnectionId,
    room: Arc<Mutex<Option<RoomId>>>,
}

impl ClientSession {
    async fn handle_signal(&self, signal: SignalMessage) {
        match signal {
            SignalMessage::Join { peer_id, room_id } => {
                if peer_id != self.peer_id {
                    warn!("{} tried to join as {}", self.peer_id, peer_id);
                    self.reject(
                        ErrorCode::SenderMismatch,
                        "peer_id does not match connection".to_owned(),
                    );
                    return;
                }

                // The old room stays recorded until its leave is out, so an
                // aborted task still leaves it from the socket cleanup.
                let previous = self.room.lock().await.clone();
                if let Some(old) = previous.filter(|old| old != &room_id) {
                    self.dispatch(&old, self.leave_command()).await;
                }
                *self.room.lock().await = Some(room_id.clone());

                info!("Peer {} wants to join room '{}'", self.peer_id, room_id);
                let join = RoomCommand::Join {
                    peer_id: self.peer_id,
                    connection: self.connection,
                };
                self.dispatch(&room_id, join).await;
            }

            SignalMessage::Leave { .. } => {
                let room = self.room.lock().await.take();
                if let Some(room_id) = room {
                    self.dispatch(&room_id, self.leave_command()).await;
                }
            }

            msg @ (SignalMessage::Offer { .. }
            | SignalMessage::Answer { .. }
            | SignalMessage::Candidate { .. }) => {
                let Some(room_id) = msg.relay_route().map(|r| r.room_id.clone()) else {
                    return;
                };
                let relay = RoomCommand::Relay {
                    from: self.peer_id,
                    message: msg,
                };
                self.dispatch(&room_id, relay).await;
            }

            other => {
                warn!("Peer {} sent server-only op {}", self.peer_id, other.op());
                self.reject(
                    ErrorCode::InvalidMessage,
                    format!("'{}' is not accepted from clients", other.op()),
                );
            }
        }
    }

    fn leave_command(&self) -> RoomCommand {
        RoomCommand::Leave {
            peer_id: self.peer_id,
            connection: self.connection,
        }
    }

    async fn dispatch(&self, room_id: &RoomId, cmd: RoomCommand) {
        self.state.room_manager.dispatch(room_id, cmd).await;
    }

    fn reject(&self, code: ErrorCode, message: String) {
        self.state
            .signaling
            .send_signal_now(&self.peer_id, &SignalMessage::error(code, message));
    }
}
