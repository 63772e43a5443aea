use async_trait::async_trait;
use tandem_core::{ErrorCode, PeerId, SignalMessage};

/// Outbound side of the relay: how a room reaches a connected peer.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Deliver one message to `peer_id`. Unreachable peers are logged, not
    /// reported, since the room cannot do anything about them.
    async fn send_signal(&self, peer_id: &PeerId, msg: SignalMessage);

    async fn send_error(&self, peer_id: &PeerId, code: ErrorCode, message: String) {
        self.send_signal(peer_id, SignalMessage::error(code, message))
            .await;
    }
}
