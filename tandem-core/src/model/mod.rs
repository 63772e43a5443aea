mod error;
mod peer;
mod room;
mod signaling;

pub use error::ModelError;
pub use peer::PeerId;
pub use room::{RoomId, SessionIdentity};
pub use signaling::{
    ErrorCode, IceCandidate, IceServerConfig, RelayRoute, SdpType, SessionDescription,
    SignalMessage,
};
