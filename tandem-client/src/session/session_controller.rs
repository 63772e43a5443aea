use crate::adapter::AdapterFactory;
use crate::channel::{ChannelEvent, ChannelHandle};
use crate::negotiation::{PeerCommand, PeerContext, PeerSession, PeerSessionHandle};
use crate::session::SessionEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{IceServerConfig, PeerId, SessionIdentity, SignalMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Requests from the application to a running session.
#[derive(Debug)]
pub enum ClientCommand {
    /// Explicit offer cue towards `peer_id`.
    Negotiate(PeerId),
    Leave,
    Stop,
}

/// Owns the per-peer sessions of one client and turns signaling traffic into
/// commands for them.
///
/// Only the newer member of a pair offers: a `welcome` for another peer that
/// arrives after our own `welcome` is the cue. Roster welcomes received before
/// it announce members that will offer to us instead.
pub struct SessionController {
    identity: SessionIdentity,
    factory: Arc<dyn AdapterFactory>,
    negotiation_timeout: Duration,
    ice_servers: Vec<IceServerConfig>,
    channel: ChannelHandle,
    channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
    peers: HashMap<PeerId, PeerSessionHandle>,
    /// Our own welcome arrived on the current connection.
    welcomed: bool,
    /// Cleared by an explicit leave; a reconnect then does not re-join.
    wants_room: bool,
}

impl SessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: SessionIdentity,
        factory: Arc<dyn AdapterFactory>,
        negotiation_timeout: Duration,
        ice_servers: Vec<IceServerConfig>,
        channel: ChannelHandle,
        channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
        commands: mpsc::UnboundedReceiver<ClientCommand>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            identity,
            factory,
            negotiation_timeout,
            ice_servers,
            channel,
            channel_events,
            commands,
            events,
            peers: HashMap::new(),
            welcomed: false,
            wants_room: true,
        }
    }

    pub async fn run(mut self) {
        info!(
            "Session {} for room '{}' started",
            self.identity.peer_id, self.identity.room_id
        );

        loop {
            tokio::select! {
                event = self.channel_events.recv() => match event {
                    Some(ChannelEvent::Closed) | None => break,
                    Some(event) => self.handle_channel_event(event).await,
                },

                cmd = self.commands.recv() => match cmd {
                    Some(ClientCommand::Stop) | None => {
                        self.channel.close();
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                },
            }
        }

        self.close_all_peers().await;
        self.emit(SessionEvent::Stopped);
        info!("Session {} stopped", self.identity.peer_id);
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.welcomed = false;
                self.emit(SessionEvent::SignalingConnected);
                if self.wants_room {
                    self.send_join();
                }
            }

            ChannelEvent::Disconnected {
                reason,
                will_reconnect,
            } => {
                // Everything negotiated over the dead socket starts over.
                self.welcomed = false;
                self.close_all_peers().await;
                self.emit(SessionEvent::SignalingDisconnected {
                    reason,
                    will_reconnect,
                });
            }

            ChannelEvent::Message(msg) => self.handle_signal(msg).await,

            ChannelEvent::Closed => {}
        }
    }

    async fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Negotiate(peer_id) => {
                if self.identity.is_self(&peer_id) {
                    warn!("Refusing to negotiate with ourselves");
                    return;
                }
                self.dispatch(peer_id, PeerCommand::StartOffer);
            }

            ClientCommand::Leave => {
                if !self.wants_room {
                    return;
                }
                info!("Leaving room '{}'", self.identity.room_id);
                self.wants_room = false;
                self.welcomed = false;
                let _ = self.channel.send(SignalMessage::Leave {
                    peer_id: self.identity.peer_id,
                    room_id: Some(self.identity.room_id.clone()),
                });
                self.close_all_peers().await;
                self.emit(SessionEvent::Left(self.identity.room_id.clone()));
            }

            ClientCommand::Stop => {}
        }
    }

    async fn handle_signal(&mut self, msg: SignalMessage) {
        match msg {
            SignalMessage::IceConfig { ice_servers } => {
                debug!("Using {} ICE servers from the server", ice_servers.len());
                self.ice_servers = ice_servers;
            }

            SignalMessage::Welcome { peer_id } if self.identity.is_self(&peer_id) => {
                if !self.welcomed {
                    info!("Joined room '{}'", self.identity.room_id);
                    self.welcomed = true;
                    self.emit(SessionEvent::Joined(self.identity.room_id.clone()));
                }
            }

            SignalMessage::Welcome { peer_id } => {
                self.emit(SessionEvent::PeerJoined(peer_id));
                if self.welcomed {
                    self.dispatch(peer_id, PeerCommand::StartOffer);
                }
            }

            SignalMessage::Leave { peer_id, .. } => {
                if self.identity.is_self(&peer_id) {
                    return;
                }
                if let Some(handle) = self.peers.remove(&peer_id) {
                    info!("Peer {} left, closing its connection", peer_id);
                    handle.close().await;
                }
                self.emit(SessionEvent::PeerLeft(peer_id));
            }

            SignalMessage::Offer {
                sender_id,
                target_id,
                description,
                ..
            } => {
                if self.is_for_us(&sender_id, target_id.as_ref()) {
                    self.dispatch(sender_id, PeerCommand::RemoteOffer(description));
                }
            }

            SignalMessage::Answer {
                sender_id,
                target_id,
                description,
                ..
            } => {
                if !self.is_for_us(&sender_id, target_id.as_ref()) {
                    return;
                }
                match self.peers.get(&sender_id) {
                    Some(handle) => {
                        handle.send(PeerCommand::RemoteAnswer(description));
                    }
                    None => warn!("Discarding answer from {}: no offer outstanding", sender_id),
                }
            }

            SignalMessage::Candidate {
                sender_id,
                target_id,
                candidate,
                ..
            } => {
                if self.is_for_us(&sender_id, target_id.as_ref()) {
                    self.dispatch(sender_id, PeerCommand::RemoteCandidate(candidate));
                }
            }

            SignalMessage::Error { code, message } => {
                warn!("Server rejected a message: {} ({})", message, code);
                self.emit(SessionEvent::ServerError { code, message });
            }

            SignalMessage::Join { .. } => {
                debug!("Ignoring join relayed to a client");
            }
        }
    }

    fn is_for_us(&self, sender: &PeerId, target: Option<&PeerId>) -> bool {
        if self.identity.is_self(sender) {
            return false;
        }
        target.is_none_or(|t| self.identity.is_self(t))
    }

    /// Routes `cmd` to the session for `remote`, starting one if needed.
    fn dispatch(&mut self, remote: PeerId, cmd: PeerCommand) {
        if self.peers.get(&remote).is_some_and(|h| h.is_finished()) {
            self.peers.remove(&remote);
        }

        let ctx = self.peer_context();
        let handle = self
            .peers
            .entry(remote)
            .or_insert_with(|| PeerSession::spawn(remote, ctx));

        if !handle.send(cmd) {
            debug!("Peer session for {} already ended", remote);
        }
    }

    fn peer_context(&self) -> PeerContext {
        PeerContext {
            identity: self.identity.clone(),
            factory: self.factory.clone(),
            ice_servers: self.ice_servers.clone(),
            negotiation_timeout: self.negotiation_timeout,
            outbound: self.channel.sender(),
            events: self.events.clone(),
        }
    }

    fn send_join(&self) {
        info!("Joining room '{}'", self.identity.room_id);
        let join = SignalMessage::Join {
            peer_id: self.identity.peer_id,
            room_id: self.identity.room_id.clone(),
        };
        if let Err(e) = self.channel.send(join) {
            warn!("Could not queue join: {}", e);
        }
    }

    async fn close_all_peers(&mut self) {
        for (_, handle) in self.peers.drain() {
            handle.close().await;
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
