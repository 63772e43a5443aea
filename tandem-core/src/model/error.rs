use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid peer id: {0:?}")]
    InvalidPeerId(String),

    #[error("room id must not be empty")]
    EmptyRoomId,
}
