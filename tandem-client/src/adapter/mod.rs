mod rtc_adapter;

pub use rtc_adapter::{RtcAdapter, RtcAdapterFactory};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tandem_core::{IceCandidate, IceServerConfig, PeerId, SessionDescription};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("a remote description is already set")]
    RemoteDescriptionAlreadySet,
    #[error("no remote description set")]
    NoRemoteDescription,
    #[error("peer connection is closed")]
    Closed,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Connection state as reported by the ICE/DTLS stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for PeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    /// A local candidate was gathered and should be trickled to the remote.
    IceCandidate(IceCandidate),
    StateChanged(PeerConnectionState),
}

/// The negotiation primitive one remote peer is connected through.
///
/// Implementations must be usable behind `Arc<dyn PeerConnectionAdapter>`;
/// events are pushed into the channel handed to [`AdapterFactory::create`].
#[async_trait]
pub trait PeerConnectionAdapter: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, AdapterError>;

    /// Requires a remote offer to have been applied.
    async fn create_answer(&self) -> Result<SessionDescription, AdapterError>;

    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), AdapterError>;

    /// Fails with [`AdapterError::RemoteDescriptionAlreadySet`] on a second call.
    async fn set_remote_description(&self, desc: &SessionDescription) -> Result<(), AdapterError>;

    /// Fails with [`AdapterError::NoRemoteDescription`] before the remote
    /// description is applied.
    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), AdapterError>;

    /// Idempotent.
    async fn close(&self) -> Result<(), AdapterError>;
}

#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn create(
        &self,
        remote: PeerId,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Result<Arc<dyn PeerConnectionAdapter>, AdapterError>;
}
