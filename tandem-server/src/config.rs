use std::net::SocketAddr;
use tandem_core::IceServerConfig;

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

/// Limits applied to every room actor.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Members admitted before joins are rejected with `room_full`.
    pub max_members: usize,
    /// Capacity of the room's command queue.
    pub queue_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_members: 8,
            queue_size: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Pushed to every client right after its socket opens.
    pub ice_servers: Vec<IceServerConfig>,
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN_ADDR)],
            room: RoomConfig::default(),
        }
    }
}
