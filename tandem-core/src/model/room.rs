use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{ModelError, PeerId};

/// Name of a signaling room, chosen by the client that joins it.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::EmptyRoomId);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who a client is and where it wants to signal, fixed for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub peer_id: PeerId,
    pub room_id: RoomId,
}

impl SessionIdentity {
    /// Fresh identity in `room_id`.
    pub fn new(room_id: RoomId) -> Self {
        Self {
            peer_id: PeerId::new(),
            room_id,
        }
    }

    pub fn is_self(&self, peer_id: &PeerId) -> bool {
        &self.peer_id == peer_id
    }
}
