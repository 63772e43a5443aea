use crate::adapter::{AdapterError, PeerConnectionAdapter, PeerConnectionState};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{IceCandidate, PeerId, SessionDescription, SessionIdentity, SignalMessage};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    Offering,
    OfferSent,
    Answering,
    Connected,
    Closed,
    Failed,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Closed | NegotiationState::Failed)
    }

    /// States guarded by the negotiation timeout.
    fn is_pending(self) -> bool {
        matches!(
            self,
            NegotiationState::Offering | NegotiationState::OfferSent | NegotiationState::Answering
        )
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::Offering => "offering",
            NegotiationState::OfferSent => "offer-sent",
            NegotiationState::Answering => "answering",
            NegotiationState::Connected => "connected",
            NegotiationState::Closed => "closed",
            NegotiationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The remote side sent something the current state cannot accept.
    #[error("unexpected {op} while {state}")]
    OutOfSequence {
        op: &'static str,
        state: NegotiationState,
    },
    #[error("peer connection failed: {0}")]
    Adapter(#[from] AdapterError),
    #[error("negotiation timed out while {0}")]
    TimedOut(NegotiationState),
}

/// Offer/answer bookkeeping for the connection to one remote peer.
///
/// Outgoing signals are pushed into `outbound` already addressed to the
/// remote peer. Methods that touch the adapter suspend the caller; callers
/// serialize access (one [`PeerSession`](crate::PeerSession) task per peer).
pub struct Negotiation {
    identity: SessionIdentity,
    remote: PeerId,
    adapter: Arc<dyn PeerConnectionAdapter>,
    outbound: mpsc::UnboundedSender<SignalMessage>,
    state: NegotiationState,
    cached_offer: Option<SessionDescription>,
    remote_applied: bool,
    pending_candidates: VecDeque<IceCandidate>,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Negotiation {
    pub fn new(
        identity: SessionIdentity,
        remote: PeerId,
        adapter: Arc<dyn PeerConnectionAdapter>,
        outbound: mpsc::UnboundedSender<SignalMessage>,
        timeout: Duration,
    ) -> Self {
        Self {
            identity,
            remote,
            adapter,
            outbound,
            state: NegotiationState::Idle,
            cached_offer: None,
            remote_applied: false,
            pending_candidates: VecDeque::new(),
            timeout,
            deadline: None,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn remote(&self) -> PeerId {
        self.remote
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    fn set_state(&mut self, next: NegotiationState) {
        if self.state == next {
            return;
        }
        debug!("Negotiation with {}: {} -> {}", self.remote, self.state, next);
        self.state = next;

        if next.is_pending() {
            if self.deadline.is_none() {
                self.deadline = Some(Instant::now() + self.timeout);
            }
        } else {
            self.deadline = None;
        }
    }

    fn out_of_sequence(&self, op: &'static str) -> NegotiationError {
        NegotiationError::OutOfSequence {
            op,
            state: self.state,
        }
    }

    /// Offer cue. Creates and sends an offer from `idle`; once an offer is
    /// outstanding, resends the cached one unchanged.
    pub async fn start_offer(&mut self) -> Result<(), NegotiationError> {
        match self.state {
            NegotiationState::Idle => {}
            NegotiationState::OfferSent => {
                if let Some(offer) = self.cached_offer.clone() {
                    info!("Resending cached offer to {}", self.remote);
                    self.send_description(offer);
                    return Ok(());
                }
                return Err(self.out_of_sequence("offer cue"));
            }
            _ => return Err(self.out_of_sequence("offer cue")),
        }

        self.set_state(NegotiationState::Offering);
        let offer = self.adapter.create_offer().await?;
        self.adapter.set_local_description(&offer).await?;
        self.cached_offer = Some(offer.clone());

        info!("Sending offer to {}", self.remote);
        self.send_description(offer);
        self.set_state(NegotiationState::OfferSent);
        Ok(())
    }

    pub async fn handle_offer(&mut self, offer: SessionDescription) -> Result<(), NegotiationError> {
        if self.state != NegotiationState::Idle {
            return Err(self.out_of_sequence("offer"));
        }

        self.set_state(NegotiationState::Answering);
        self.apply_remote(&offer).await?;

        let answer = self.adapter.create_answer().await?;
        self.adapter.set_local_description(&answer).await?;

        info!("Sending answer to {}", self.remote);
        self.send_description(answer);
        Ok(())
    }

    pub async fn handle_answer(&mut self, answer: SessionDescription) -> Result<(), NegotiationError> {
        if self.state != NegotiationState::OfferSent || self.remote_applied {
            return Err(self.out_of_sequence("answer"));
        }

        info!("Applying answer from {}", self.remote);
        self.apply_remote(&answer).await
    }

    /// Applies a remote candidate, or buffers it until the remote
    /// description is in place.
    pub async fn handle_remote_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            return Err(self.out_of_sequence("candidate"));
        }

        if !self.remote_applied {
            debug!(
                "Buffering candidate from {} ({} pending)",
                self.remote,
                self.pending_candidates.len() + 1
            );
            self.pending_candidates.push_back(candidate);
            return Ok(());
        }

        self.adapter.add_ice_candidate(&candidate).await?;
        Ok(())
    }

    /// Trickles a locally gathered candidate to the remote peer.
    pub fn handle_local_candidate(&mut self, candidate: IceCandidate) {
        if self.state.is_terminal() {
            return;
        }

        let msg = SignalMessage::Candidate {
            sender_id: self.identity.peer_id,
            room_id: self.identity.room_id.clone(),
            target_id: Some(self.remote),
            candidate,
        };
        let _ = self.outbound.send(msg);
    }

    /// Reacts to an adapter state report. `Disconnected` is transient and
    /// leaves the state untouched.
    pub fn handle_connection_state(&mut self, state: PeerConnectionState) {
        match (state, self.state) {
            (_, current) if current.is_terminal() => {}
            (PeerConnectionState::Connected, NegotiationState::OfferSent | NegotiationState::Answering) => {
                info!("Connected to {}", self.remote);
                self.set_state(NegotiationState::Connected);
            }
            (PeerConnectionState::Failed | PeerConnectionState::Closed, NegotiationState::Connected) => {
                info!("Connection to {} ended ({})", self.remote, state);
                self.set_state(NegotiationState::Closed);
            }
            (PeerConnectionState::Failed | PeerConnectionState::Closed, _) => {
                error!("Connection to {} {} before connecting", self.remote, state);
                self.set_state(NegotiationState::Failed);
            }
            _ => {}
        }
    }

    /// Marks the negotiation failed if it is still pending past its deadline.
    pub async fn expire(&mut self) -> Result<(), NegotiationError> {
        if !self.state.is_pending() {
            self.deadline = None;
            return Ok(());
        }

        let state = self.state;
        error!("Negotiation with {} timed out while {}", self.remote, state);
        self.fail().await;
        Err(NegotiationError::TimedOut(state))
    }

    /// Moves to `failed` and releases the adapter.
    pub async fn fail(&mut self) {
        self.set_state(NegotiationState::Failed);
        self.release().await;
    }

    /// Moves to `closed` (a failed negotiation stays failed) and releases
    /// the adapter. Safe from any state.
    pub async fn close(&mut self) {
        if !self.state.is_terminal() {
            self.set_state(NegotiationState::Closed);
        }
        self.release().await;
    }

    async fn release(&mut self) {
        self.pending_candidates.clear();
        if let Err(e) = self.adapter.close().await {
            error!("Failed to close connection to {}: {}", self.remote, e);
        }
    }

    async fn apply_remote(&mut self, desc: &SessionDescription) -> Result<(), NegotiationError> {
        self.adapter.set_remote_description(desc).await?;
        self.remote_applied = true;

        if !self.pending_candidates.is_empty() {
            debug!(
                "Flushing {} buffered candidates from {}",
                self.pending_candidates.len(),
                self.remote
            );
        }
        while let Some(candidate) = self.pending_candidates.pop_front() {
            self.adapter.add_ice_candidate(&candidate).await?;
        }
        Ok(())
    }

    fn send_description(&self, description: SessionDescription) {
        let sender_id = self.identity.peer_id;
        let room_id = self.identity.room_id.clone();
        let target_id = Some(self.remote);

        let msg = match description.kind {
            tandem_core::SdpType::Offer => SignalMessage::Offer {
                sender_id,
                room_id,
                target_id,
                description,
            },
            tandem_core::SdpType::Answer => SignalMessage::Answer {
                sender_id,
                room_id,
                target_id,
                description,
            },
        };
        let _ = self.outbound.send(msg);
    }
}
