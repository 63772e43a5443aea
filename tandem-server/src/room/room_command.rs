use std::fmt;
use tandem_core::{PeerId, SignalMessage};

/// Identifies one WebSocket connection, so a peer that reconnected is not
/// evicted by the late cleanup of its previous socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Commands a room receives from the signaling layer.
#[derive(Debug)]
pub enum RoomCommand {
    /// The peer asks for membership (or re-announces itself).
    Join {
        peer_id: PeerId,
        connection: ConnectionId,
    },

    /// Explicit leave or socket teardown.
    Leave {
        peer_id: PeerId,
        connection: ConnectionId,
    },

    /// Offer, answer or candidate to forward to other members.
    Relay { from: PeerId, message: SignalMessage },
}
