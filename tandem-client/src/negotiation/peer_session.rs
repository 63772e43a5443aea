use crate::adapter::{AdapterError, AdapterEvent, AdapterFactory, PeerConnectionState};
use crate::negotiation::{Negotiation, NegotiationError, NegotiationState};
use crate::session::SessionEvent;
use std::future;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{IceCandidate, IceServerConfig, PeerId, SessionDescription, SessionIdentity, SignalMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Input of one peer session, in the order the remote peer sent it.
#[derive(Debug)]
pub enum PeerCommand {
    StartOffer,
    RemoteOffer(SessionDescription),
    RemoteAnswer(SessionDescription),
    RemoteCandidate(IceCandidate),
    Close,
}

/// Everything a peer session needs from the client that owns it.
#[derive(Clone)]
pub struct PeerContext {
    pub identity: SessionIdentity,
    pub factory: Arc<dyn AdapterFactory>,
    pub ice_servers: Vec<IceServerConfig>,
    pub negotiation_timeout: Duration,
    pub outbound: mpsc::UnboundedSender<SignalMessage>,
    pub events: mpsc::UnboundedSender<SessionEvent>,
}

/// Handle to a running peer session actor.
pub struct PeerSessionHandle {
    remote: PeerId,
    tx: mpsc::UnboundedSender<PeerCommand>,
    task: JoinHandle<()>,
}

impl PeerSessionHandle {
    /// Queues `cmd`; false once the session has ended.
    pub fn send(&self, cmd: PeerCommand) -> bool {
        self.tx.send(cmd).is_ok()
    }

    pub fn remote(&self) -> PeerId {
        self.remote
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Asks the session to close its connection and waits until it has.
    pub async fn close(self) {
        let _ = self.tx.send(PeerCommand::Close);
        if let Err(e) = self.task.await {
            error!("Peer session for {} panicked: {}", self.remote, e);
        }
    }
}

/// Actor owning the connection to one remote peer.
///
/// A failed or closed attempt keeps the actor alive: the next offer cue or
/// remote offer starts over on a fresh adapter.
pub struct PeerSession {
    ctx: PeerContext,
    negotiation: Negotiation,
    commands: mpsc::UnboundedReceiver<PeerCommand>,
    adapter_events: mpsc::UnboundedReceiver<AdapterEvent>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl PeerSession {
    pub fn spawn(remote: PeerId, ctx: PeerContext) -> PeerSessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::start(remote, ctx, rx));
        PeerSessionHandle { remote, tx, task }
    }

    async fn start(remote: PeerId, ctx: PeerContext, commands: mpsc::UnboundedReceiver<PeerCommand>) {
        let (negotiation, adapter_events) = match open(remote, &ctx).await {
            Ok(opened) => opened,
            Err(e) => {
                error!("Could not create peer connection for {}: {}", remote, e);
                let _ = ctx.events.send(SessionEvent::NegotiationFailed {
                    peer_id: remote,
                    reason: e.to_string(),
                });
                return;
            }
        };

        let session = PeerSession {
            events: ctx.events.clone(),
            ctx,
            negotiation,
            commands,
            adapter_events,
        };
        session.run().await;
    }

    async fn run(mut self) {
        let remote = self.negotiation.remote();
        debug!("Peer session for {} started", remote);

        loop {
            let deadline = self.negotiation.deadline();

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(PeerCommand::Close) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },

                Some(event) = self.adapter_events.recv() => self.handle_adapter_event(event).await,

                _ = sleep_until(deadline) => {
                    let before = self.negotiation.state();
                    let result = self.negotiation.expire().await;
                    self.after_step(before, result).await;
                }
            }
        }

        let before = self.negotiation.state();
        self.negotiation.close().await;
        self.report_transition(before);
        debug!("Peer session for {} finished", remote);
    }

    async fn handle_command(&mut self, cmd: PeerCommand) {
        let before = self.negotiation.state();

        let starts_over = matches!(cmd, PeerCommand::StartOffer | PeerCommand::RemoteOffer(_));
        if starts_over && before.is_terminal() && !self.restart().await {
            return;
        }

        let result = match cmd {
            PeerCommand::StartOffer => self.negotiation.start_offer().await,
            PeerCommand::RemoteOffer(offer) => self.negotiation.handle_offer(offer).await,
            PeerCommand::RemoteAnswer(answer) => self.negotiation.handle_answer(answer).await,
            PeerCommand::RemoteCandidate(candidate) => {
                self.negotiation.handle_remote_candidate(candidate).await
            }
            PeerCommand::Close => Ok(()),
        };

        self.after_step(before, result).await;
    }

    /// Replaces a finished attempt with a new adapter in `idle`.
    async fn restart(&mut self) -> bool {
        let remote = self.negotiation.remote();
        match open(remote, &self.ctx).await {
            Ok((negotiation, adapter_events)) => {
                info!("Renegotiating with {} after {}", remote, self.negotiation.state());
                self.negotiation = negotiation;
                self.adapter_events = adapter_events;
                true
            }
            Err(e) => {
                error!("Could not recreate peer connection for {}: {}", remote, e);
                let _ = self.events.send(SessionEvent::NegotiationFailed {
                    peer_id: remote,
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    async fn handle_adapter_event(&mut self, event: AdapterEvent) {
        let before = self.negotiation.state();

        match event {
            AdapterEvent::IceCandidate(candidate) => {
                self.negotiation.handle_local_candidate(candidate);
            }
            AdapterEvent::StateChanged(PeerConnectionState::Disconnected) => {
                let _ = self
                    .events
                    .send(SessionEvent::PeerDisconnected(self.negotiation.remote()));
            }
            AdapterEvent::StateChanged(state) => {
                self.negotiation.handle_connection_state(state);

                match self.negotiation.state() {
                    NegotiationState::Failed if before != NegotiationState::Failed => {
                        self.negotiation.fail().await;
                        let _ = self.events.send(SessionEvent::NegotiationFailed {
                            peer_id: self.negotiation.remote(),
                            reason: format!("connection {}", state),
                        });
                    }
                    NegotiationState::Closed if before != NegotiationState::Closed => {
                        self.negotiation.close().await;
                    }
                    _ => {}
                }
            }
        }

        self.report_transition(before);
    }

    async fn after_step(&mut self, before: NegotiationState, result: Result<(), NegotiationError>) {
        let remote = self.negotiation.remote();

        match result {
            Ok(()) => {}
            Err(e @ NegotiationError::OutOfSequence { .. }) => {
                warn!("Discarding signal from {}: {}", remote, e);
            }
            Err(e) => {
                error!("Negotiation with {} failed: {}", remote, e);
                self.negotiation.fail().await;
                let _ = self.events.send(SessionEvent::NegotiationFailed {
                    peer_id: remote,
                    reason: e.to_string(),
                });
            }
        }

        self.report_transition(before);
    }

    fn report_transition(&self, before: NegotiationState) {
        let state = self.negotiation.state();
        if state == before {
            return;
        }

        let peer_id = self.negotiation.remote();
        let _ = self.events.send(SessionEvent::StateChanged { peer_id, state });

        if state == NegotiationState::Connected {
            info!("Peer {} connected", peer_id);
            let _ = self.events.send(SessionEvent::PeerConnected(peer_id));
        }
    }
}

async fn open(
    remote: PeerId,
    ctx: &PeerContext,
) -> Result<(Negotiation, mpsc::UnboundedReceiver<AdapterEvent>), AdapterError> {
    let (adapter_tx, adapter_rx) = mpsc::unbounded_channel();
    let adapter = ctx.factory.create(remote, &ctx.ice_servers, adapter_tx).await?;

    let negotiation = Negotiation::new(
        ctx.identity.clone(),
        remote,
        adapter,
        ctx.outbound.clone(),
        ctx.negotiation_timeout,
    );
    Ok((negotiation, adapter_rx))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
