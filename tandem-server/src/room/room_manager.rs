use crate::config::RoomConfig;
use crate::room::{Room, RoomCommand};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tandem_core::RoomId;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Clone)]
struct RoomHandle {
    generation: u64,
    tx: mpsc::Sender<RoomCommand>,
}

/// Registry of live room actors. Rooms are spawned on first use and remove
/// themselves once their last member has left.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    signaling: Arc<dyn SignalingOutput>,
    config: RoomConfig,
    next_generation: Arc<AtomicU64>,
}

impl RoomManager {
    pub fn new(signaling: Arc<dyn SignalingOutput>, config: RoomConfig) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            signaling,
            config,
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn get_room_sender(&self, room_id: &RoomId) -> RoomHandle {
        if let Some(handle) = self.rooms.get(room_id) {
            return handle.clone();
        }

        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                info!("Creating new room: {} (#{})", room_id, generation);

                let (tx, rx) = mpsc::channel(self.config.queue_size);
                let room = Room::new(
                    room_id.clone(),
                    generation,
                    self.config.clone(),
                    rx,
                    self.signaling.clone(),
                    self.clone(),
                );
                tokio::spawn(room.run());

                RoomHandle { generation, tx }
            })
            .clone()
    }

    /// Delivers `cmd` to the room actor, creating the room if needed.
    ///
    /// A send can race with the room shutting down after its last leave; the
    /// stale entry is then dropped and the command goes to a fresh room.
    pub async fn dispatch(&self, room_id: &RoomId, mut cmd: RoomCommand) {
        loop {
            let handle = self.get_room_sender(room_id);
            match handle.tx.send(cmd).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    debug!("Room '{}' closed while dispatching, retrying", room_id);
                    self.unregister(room_id, handle.generation);
                    cmd = returned;
                }
            }
        }
    }

    pub(crate) fn unregister(&self, room_id: &RoomId, generation: u64) {
        if self
            .rooms
            .remove_if(room_id, |_, handle| handle.generation == generation)
            .is_some()
        {
            info!("Room '{}' discarded", room_id);
        }
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
