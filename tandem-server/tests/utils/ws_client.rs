use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{PeerId, RoomId, SignalMessage};
use tandem_server::{AppState, ServerConfig, serve};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Timeout for a single expected signal (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 2000;

/// Starts a signaling server on an ephemeral port.
pub async fn spawn_test_server(config: ServerConfig) -> (SocketAddr, Arc<AppState>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local addr");
    let state = AppState::new(&config);

    tokio::spawn(serve(listener, state.clone(), std::future::pending()));

    (addr, state)
}

/// Raw WebSocket peer speaking the signaling protocol.
pub struct WsTestClient {
    pub peer_id: PeerId,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTestClient {
    pub async fn connect(addr: SocketAddr, peer_id: PeerId) -> Result<Self> {
        let url = format!("ws://{}/ws/{}", addr, peer_id);
        let (stream, _) = connect_async(url).await.context("WebSocket connect failed")?;
        Ok(Self { peer_id, stream })
    }

    pub async fn send(&mut self, msg: &SignalMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.stream.send(Message::Text(json)).await?;
        Ok(())
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::Text(text.to_owned())).await?;
        Ok(())
    }

    pub async fn join(&mut self, room: &str) -> Result<()> {
        let msg = SignalMessage::Join {
            peer_id: self.peer_id,
            room_id: RoomId::new(room)?,
        };
        self.send(&msg).await
    }

    /// Next signal, or `None` once the server closed the socket.
    pub async fn recv(&mut self, timeout_ms: u64) -> Result<Option<SignalMessage>> {
        let deadline = Duration::from_millis(timeout_ms);
        loop {
            let next = tokio::time::timeout(deadline, self.stream.next())
                .await
                .context("Timeout waiting for signal")?;
            match next {
                Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(&text)?)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Skips signals until one matches `pred`.
    pub async fn recv_until<F>(&mut self, timeout_ms: u64, pred: F) -> Result<SignalMessage>
    where
        F: Fn(&SignalMessage) -> bool,
    {
        loop {
            match self.recv(timeout_ms).await? {
                Some(msg) if pred(&msg) => return Ok(msg),
                Some(_) => continue,
                None => anyhow::bail!("Socket closed while waiting"),
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
