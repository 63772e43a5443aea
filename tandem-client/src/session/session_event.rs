use crate::negotiation::NegotiationState;
use tandem_core::{ErrorCode, PeerId, RoomId};

/// Notifications surfaced to the application. Failures arrive here as named
/// events; nothing inside the session propagates raw errors upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The signaling socket is (re)connected and `join` was sent.
    SignalingConnected,
    SignalingDisconnected { reason: String, will_reconnect: bool },
    /// The server acknowledged our membership.
    Joined(RoomId),
    Left(RoomId),
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    StateChanged { peer_id: PeerId, state: NegotiationState },
    PeerConnected(PeerId),
    /// Transient media-path interruption; the connection may recover.
    PeerDisconnected(PeerId),
    NegotiationFailed { peer_id: PeerId, reason: String },
    /// The server rejected one of our messages.
    ServerError { code: ErrorCode, message: String },
    Stopped,
}
