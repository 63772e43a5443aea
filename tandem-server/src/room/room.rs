use crate::config::RoomConfig;
use crate::room::room_command::{ConnectionId, RoomCommand};
use crate::room::room_manager::RoomManager;
use crate::signaling::SignalingOutput;
use std::sync::Arc;
use tandem_core::{ErrorCode, PeerId, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct Member {
    peer_id: PeerId,
    connection: ConnectionId,
}

/// Room actor. Owns the membership of one room; every join, leave and relay
/// for the room goes through its command queue, one at a time.
pub struct Room {
    room_id: RoomId,
    generation: u64,
    /// Members in join order.
    members: Vec<Member>,
    config: RoomConfig,
    command_rx: mpsc::Receiver<RoomCommand>,
    signaling: Arc<dyn SignalingOutput>,
    manager: RoomManager,
}

impl Room {
    pub(crate) fn new(
        room_id: RoomId,
        generation: u64,
        config: RoomConfig,
        command_rx: mpsc::Receiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
        manager: RoomManager,
    ) -> Self {
        Self {
            room_id,
            generation,
            members: Vec::new(),
            config,
            command_rx,
            signaling,
            manager,
        }
    }

    pub async fn run(mut self) {
        info!("Room '{}' event loop started", self.room_id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;

            if self.members.is_empty() {
                break;
            }
        }

        self.shutdown().await;
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                peer_id,
                connection,
            } => self.join(peer_id, connection).await,

            RoomCommand::Leave {
                peer_id,
                connection,
            } => self.leave(peer_id, connection).await,

            RoomCommand::Relay { from, message } => self.route(from, message).await,
        }
    }

    async fn join(&mut self, peer_id: PeerId, connection: ConnectionId) {
        let replaced_connection = match self.members.iter_mut().find(|m| m.peer_id == peer_id) {
            Some(member) if member.connection != connection => {
                let old = member.connection;
                member.connection = connection;
                Some(old)
            }
            Some(_) => None,
            None => {
                if self.members.len() >= self.config.max_members {
                    warn!("Room '{}' is full, rejecting {}", self.room_id, peer_id);
                    self.signaling
                        .send_error(
                            &peer_id,
                            ErrorCode::RoomFull,
                            format!("room '{}' is full", self.room_id),
                        )
                        .await;
                    return;
                }
                info!("Peer {} joined room '{}'", peer_id, self.room_id);
                self.members.push(Member {
                    peer_id,
                    connection,
                });
                None
            }
        };

        if let Some(old) = replaced_connection {
            // Other members still hold negotiation state for the old socket.
            info!(
                "Peer {} rejoined room '{}' from {} (was {})",
                peer_id, self.room_id, connection, old
            );
            let leave = SignalMessage::Leave {
                peer_id,
                room_id: Some(self.room_id.clone()),
            };
            self.broadcast(Some(&peer_id), leave).await;
        }

        let roster: Vec<PeerId> = self
            .members
            .iter()
            .map(|m| m.peer_id)
            .filter(|id| id != &peer_id)
            .collect();
        for existing in roster {
            self.signaling
                .send_signal(&peer_id, SignalMessage::Welcome { peer_id: existing })
                .await;
        }

        self.broadcast(None, SignalMessage::Welcome { peer_id })
            .await;
    }

    async fn leave(&mut self, peer_id: PeerId, connection: ConnectionId) {
        let Some(pos) = self.members.iter().position(|m| m.peer_id == peer_id) else {
            debug!("Leave for non-member {} in room '{}'", peer_id, self.room_id);
            return;
        };

        if self.members[pos].connection != connection {
            debug!(
                "Ignoring leave of {} from stale {} in room '{}'",
                peer_id, connection, self.room_id
            );
            return;
        }

        self.members.remove(pos);
        info!("Peer {} left room '{}'", peer_id, self.room_id);

        let leave = SignalMessage::Leave {
            peer_id,
            room_id: Some(self.room_id.clone()),
        };
        self.broadcast(None, leave).await;
    }

    async fn route(&self, from: PeerId, message: SignalMessage) {
        let Some(route) = message.relay_route() else {
            warn!("Room '{}' got a non-relay {} from {}", self.room_id, message.op(), from);
            self.signaling
                .send_error(&from, ErrorCode::InvalidMessage, "not a relay message".to_owned())
                .await;
            return;
        };

        if route.sender_id != &from {
            warn!(
                "Peer {} tried to relay {} as {}",
                from,
                message.op(),
                route.sender_id
            );
            self.signaling
                .send_error(&from, ErrorCode::SenderMismatch, "sender_id does not match connection".to_owned())
                .await;
            return;
        }

        if !self.is_member(&from) {
            warn!(
                "Dropping {} from {}: not a member of room '{}'",
                message.op(),
                from,
                self.room_id
            );
            self.signaling
                .send_error(
                    &from,
                    ErrorCode::NotInRoom,
                    format!("not a member of room '{}'", self.room_id),
                )
                .await;
            return;
        }

        match route.target_id {
            Some(target) if target == &from || !self.is_member(target) => {
                warn!(
                    "Dropping {} from {}: unknown target {}",
                    message.op(),
                    from,
                    target
                );
                self.signaling
                    .send_error(
                        &from,
                        ErrorCode::UnknownPeer,
                        format!("{} is not another member of room '{}'", target, self.room_id),
                    )
                    .await;
            }
            Some(target) => {
                debug!("Relaying {} {} -> {}", message.op(), from, target);
                self.signaling.send_signal(target, message.clone()).await;
            }
            None => {
                debug!("Relaying {} from {} to room '{}'", message.op(), from, self.room_id);
                self.broadcast(Some(&from), message.clone()).await;
            }
        }
    }

    /// Sends `msg` to every member except `skip`.
    async fn broadcast(&self, skip: Option<&PeerId>, msg: SignalMessage) {
        for member in &self.members {
            if Some(&member.peer_id) == skip {
                continue;
            }
            self.signaling.send_signal(&member.peer_id, msg.clone()).await;
        }
    }

    fn is_member(&self, peer_id: &PeerId) -> bool {
        self.members.iter().any(|m| &m.peer_id == peer_id)
    }

    /// Unregisters the emptied room and hands commands that were already
    /// queued behind the last leave back to the manager.
    async fn shutdown(mut self) {
        self.manager.unregister(&self.room_id, self.generation);
        self.command_rx.close();

        let mut leftovers = Vec::new();
        while let Some(cmd) = self.command_rx.recv().await {
            leftovers.push(cmd);
        }

        if !leftovers.is_empty() {
            debug!(
                "Room '{}' re-dispatching {} queued commands",
                self.room_id,
                leftovers.len()
            );
        }
        for cmd in leftovers {
            self.manager.dispatch(&self.room_id, cmd).await;
        }

        info!("Room '{}' event loop finished", self.room_id);
    }
}
