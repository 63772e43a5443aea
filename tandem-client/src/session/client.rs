use crate::adapter::AdapterFactory;
use crate::channel::SignalingChannel;
use crate::config::ClientConfig;
use crate::session::{ClientCommand, SessionController, SessionEvent};
use std::sync::Arc;
use tandem_core::{PeerId, RoomId, SessionIdentity};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

/// Entry point of the client side.
pub struct Client;

impl Client {
    /// Connects to the signaling server and joins the configured room.
    ///
    /// Progress is reported through the returned event stream; the session
    /// runs until [`ClientHandle::stop`] or until reconnecting gives up.
    pub fn start(
        config: ClientConfig,
        factory: Arc<dyn AdapterFactory>,
    ) -> (ClientHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (channel, channel_events) =
            SignalingChannel::spawn(config.signaling_url(), config.reconnect.clone());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let controller = SessionController::new(
            config.identity.clone(),
            factory,
            config.negotiation_timeout,
            config.ice_servers,
            channel,
            channel_events,
            commands_rx,
            events_tx,
        );
        let task = tokio::spawn(controller.run());

        let handle = ClientHandle {
            identity: config.identity,
            commands: commands_tx,
            task,
        };
        (handle, events_rx)
    }
}

pub struct ClientHandle {
    identity: SessionIdentity,
    commands: mpsc::UnboundedSender<ClientCommand>,
    task: JoinHandle<()>,
}

impl ClientHandle {
    pub fn peer_id(&self) -> PeerId {
        self.identity.peer_id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.identity.room_id
    }

    /// Sends an offer to `peer_id` now instead of waiting for a cue.
    pub fn negotiate(&self, peer_id: PeerId) {
        let _ = self.commands.send(ClientCommand::Negotiate(peer_id));
    }

    /// Leaves the room and closes every peer connection; the signaling
    /// socket stays open.
    pub fn leave(&self) {
        let _ = self.commands.send(ClientCommand::Leave);
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Closes all peer connections and the signaling socket, and waits for
    /// the session to wind down.
    pub async fn stop(self) {
        let _ = self.commands.send(ClientCommand::Stop);
        if let Err(e) = self.task.await {
            error!("Session task failed: {}", e);
        }
    }
}
