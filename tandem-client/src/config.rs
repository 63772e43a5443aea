use std::time::Duration;
use tandem_core::{IceServerConfig, RoomId, SessionIdentity};

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Exponential backoff for the signaling socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failed attempts before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Delay before the `attempt`-th retry (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_attempts: Some(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the signaling server, e.g. `ws://127.0.0.1:8080`.
    pub server_url: String,
    pub identity: SessionIdentity,
    pub reconnect: ReconnectPolicy,
    /// How long an offer or answer may stay unanswered before the
    /// connection is marked failed.
    pub negotiation_timeout: Duration,
    /// Used until the server pushes its own `ice_config`.
    pub ice_servers: Vec<IceServerConfig>,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>, room_id: RoomId) -> Self {
        Self {
            server_url: server_url.into(),
            identity: SessionIdentity::new(room_id),
            reconnect: ReconnectPolicy::default(),
            negotiation_timeout: DEFAULT_NEGOTIATION_TIMEOUT,
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN_ADDR)],
        }
    }

    pub fn signaling_url(&self) -> String {
        format!(
            "{}/ws/{}",
            self.server_url.trim_end_matches('/'),
            self.identity.peer_id
        )
    }
}
