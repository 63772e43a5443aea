use crate::model::peer::PeerId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(url: impl Into<String>, username: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    pub fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .any(|u| u.starts_with("turn:") || u.starts_with("turns:"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// An offer or answer as produced by the peer connection. Never mutated after
/// creation, so a cached offer can be resent byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One trickled ICE candidate, in the browser's `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidMessage,
    NotInRoom,
    UnknownPeer,
    SenderMismatch,
    RoomFull,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidMessage => "invalid_message",
            ErrorCode::NotInRoom => "not_in_room",
            ErrorCode::UnknownPeer => "unknown_peer",
            ErrorCode::SenderMismatch => "sender_mismatch",
            ErrorCode::RoomFull => "room_full",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum SignalMessage {
    IceConfig {
        ice_servers: Vec<IceServerConfig>,
    },
    Join {
        peer_id: PeerId,
        room_id: RoomId,
    },
    Welcome {
        peer_id: PeerId,
    },
    Leave {
        peer_id: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
    Offer {
        sender_id: PeerId,
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<PeerId>,
        description: SessionDescription,
    },
    Answer {
        sender_id: PeerId,
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<PeerId>,
        description: SessionDescription,
    },
    Candidate {
        sender_id: PeerId,
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<PeerId>,
        candidate: IceCandidate,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

/// Addressing of a peer-to-peer message the relay forwards untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayRoute<'a> {
    pub sender_id: &'a PeerId,
    pub room_id: &'a RoomId,
    pub target_id: Option<&'a PeerId>,
}

impl SignalMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// Sender, room and optional target of offer/answer/candidate messages;
    /// `None` for everything the server itself produces or consumes.
    pub fn relay_route(&self) -> Option<RelayRoute<'_>> {
        match self {
            Self::Offer {
                sender_id,
                room_id,
                target_id,
                ..
            }
            | Self::Answer {
                sender_id,
                room_id,
                target_id,
                ..
            }
            | Self::Candidate {
                sender_id,
                room_id,
                target_id,
                ..
            } => Some(RelayRoute {
                sender_id,
                room_id,
                target_id: target_id.as_ref(),
            }),
            _ => None,
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Self::IceConfig { .. } => "ice_config",
            Self::Join { .. } => "join",
            Self::Welcome { .. } => "welcome",
            Self::Leave { .. } => "leave",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::Error { .. } => "error",
        }
    }
}
