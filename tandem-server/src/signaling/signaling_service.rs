use crate::room::ConnectionId;
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tandem_core::{IceServerConfig, PeerId, SignalMessage};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

struct PeerLink {
    connection: ConnectionId,
    tx: mpsc::UnboundedSender<Message>,
}

struct SignalingInner {
    peers: DashMap<PeerId, PeerLink>,
    ice_servers: Vec<IceServerConfig>,
    next_connection: AtomicU64,
}

/// Live WebSocket connections, addressable by peer id.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                peers: DashMap::new(),
                ice_servers,
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    pub fn get_ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    /// Registers a socket writer for `peer_id`. A newer socket for the same
    /// peer replaces the older one.
    pub fn add_peer(&self, peer_id: PeerId, tx: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let connection = ConnectionId(self.inner.next_connection.fetch_add(1, Ordering::Relaxed));
        if let Some(previous) = self
            .inner
            .peers
            .insert(peer_id, PeerLink { connection, tx })
        {
            info!(
                "Peer {} reconnected ({} replaces {})",
                peer_id, connection, previous.connection
            );
        }
        connection
    }

    /// Removes the writer only if it still belongs to `connection`.
    pub fn remove_peer(&self, peer_id: &PeerId, connection: ConnectionId) {
        self.inner
            .peers
            .remove_if(peer_id, |_, link| link.connection == connection);
    }

    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.inner.peers.contains_key(peer_id)
    }

    /// Closes the peer's socket from the server side.
    pub fn disconnect(&self, peer_id: &PeerId) -> bool {
        let Some(link) = self.inner.peers.get(peer_id) else {
            return false;
        };
        info!("Closing signaling socket of {}", peer_id);
        link.tx.send(Message::Close(None)).is_ok()
    }

    pub fn send_signal_now(&self, peer_id: &PeerId, msg: &SignalMessage) {
        let Some(peer) = self.inner.peers.get(peer_id) else {
            warn!(
                "Attempted to send {} to disconnected peer {}",
                msg.op(),
                peer_id
            );
            return;
        };

        match serde_json::to_string(msg) {
            Ok(json) => {
                debug!("-> {} {}", peer_id, msg.op());
                if let Err(e) = peer.tx.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", peer_id, e);
                }
            }
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send_signal(&self, peer_id: &PeerId, msg: SignalMessage) {
        self.send_signal_now(peer_id, &msg);
    }
}
