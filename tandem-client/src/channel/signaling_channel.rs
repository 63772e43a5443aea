use crate::config::ReconnectPolicy;
use futures::{SinkExt, StreamExt};
use tandem_core::SignalMessage;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to connect: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection closed by server")]
    ClosedByServer,
    #[error("signaling channel is closed")]
    Closed,
}

/// What the channel reports to its owner.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A fresh connection is up; nothing sent before it was delivered.
    Connected,
    Message(SignalMessage),
    /// The connection dropped without being asked to.
    Disconnected { reason: String, will_reconnect: bool },
    /// The channel has stopped for good.
    Closed,
}

/// Sending half of a [`SignalingChannel`].
#[derive(Clone)]
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<SignalMessage>,
    closing: watch::Sender<bool>,
}

impl ChannelHandle {
    /// Queues `msg` for the current connection.
    pub fn send(&self, msg: SignalMessage) -> Result<(), ChannelError> {
        self.outbound.send(msg).map_err(|_| ChannelError::Closed)
    }

    /// Sender for code that only needs to push signals.
    pub fn sender(&self) -> mpsc::UnboundedSender<SignalMessage> {
        self.outbound.clone()
    }

    /// Client-initiated close; the channel does not reconnect afterwards.
    pub fn close(&self) {
        let _ = self.closing.send(true);
    }
}

enum Outcome {
    ClosedByClient,
    Lost(ChannelError),
}

/// WebSocket connection to the signaling server that reconnects on its own
/// after any disconnect the client did not ask for.
pub struct SignalingChannel {
    url: String,
    policy: ReconnectPolicy,
    outbound: mpsc::UnboundedReceiver<SignalMessage>,
    closing: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl SignalingChannel {
    pub fn spawn(
        url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> (ChannelHandle, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (closing_tx, closing_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let channel = SignalingChannel {
            url: url.into(),
            policy,
            outbound: outbound_rx,
            closing: closing_rx,
            events: events_tx,
        };
        tokio::spawn(channel.run());

        let handle = ChannelHandle {
            outbound: outbound_tx,
            closing: closing_tx,
        };
        (handle, events_rx)
    }

    /// True once closed by the client or every handle is gone.
    fn is_closing(&self) -> bool {
        *self.closing.borrow() || self.closing.has_changed().is_err()
    }

    async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            if self.is_closing() {
                break;
            }

            let lost = match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => {
                    info!("Signaling connected to {}", self.url);
                    failures = 0;
                    self.discard_stale_outbound();
                    let _ = self.events.send(ChannelEvent::Connected);

                    match self.pump(ws).await {
                        Outcome::ClosedByClient => break,
                        Outcome::Lost(e) => e,
                    }
                }
                Err(e) => ChannelError::Connect(e),
            };

            failures += 1;
            let will_reconnect = self.policy.allows(failures);
            warn!("Signaling connection lost: {} (attempt {})", lost, failures);
            let _ = self.events.send(ChannelEvent::Disconnected {
                reason: lost.to_string(),
                will_reconnect,
            });

            if !will_reconnect {
                error!("Giving up on {} after {} attempts", self.url, failures);
                break;
            }

            let delay = self.policy.delay_for(failures);
            debug!("Reconnecting in {:?}", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.closing.changed() => {}
            }
        }

        info!("Signaling channel to {} closed", self.url);
        let _ = self.events.send(ChannelEvent::Closed);
    }

    /// Messages queued while disconnected belong to a dead session.
    fn discard_stale_outbound(&mut self) {
        let mut dropped = 0;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Discarded {} signals queued while disconnected", dropped);
        }
    }

    async fn pump(&mut self, ws: WsStream) -> Outcome {
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                changed = self.closing.changed() => {
                    if changed.is_err() || *self.closing.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return Outcome::ClosedByClient;
                    }
                }

                out = self.outbound.recv() => {
                    let Some(msg) = out else {
                        let _ = write.send(Message::Close(None)).await;
                        return Outcome::ClosedByClient;
                    };
                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            debug!("-> {}", msg.op());
                            if let Err(e) = write.send(Message::Text(json)).await {
                                return Outcome::Lost(e.into());
                            }
                        }
                        Err(e) => error!("Failed to serialize signal message: {}", e),
                    }
                }

                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(msg) => {
                            debug!("<- {}", msg.op());
                            let _ = self.events.send(ChannelEvent::Message(msg));
                        }
                        Err(e) => warn!("Ignoring malformed signal: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => return Outcome::Lost(ChannelError::ClosedByServer),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Outcome::Lost(e.into()),
                },
            }
        }
    }
}
