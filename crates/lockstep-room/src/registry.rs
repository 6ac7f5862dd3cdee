//! Registry of live rooms: create, look up, coordinated shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::task::JoinSet;
use tracing::info;

use crate::room::Room;
use crate::RoomError;

/// Owns every live room. Lookups are read-locked and O(1); creation and
/// removal take the write lock briefly. Driver tasks are joined on
/// [`stop_all`](Self::stop_all).
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<u64, Arc<Room>>>>,
    drivers: Mutex<JoinSet<()>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            drivers: Mutex::new(JoinSet::new()),
        }
    }

    /// Creates a room with a fixed roster and seed, starts its loop, and
    /// registers it. The entry is removed when the loop returns.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(
        &self,
        room_id: u64,
        type_id: i32,
        roster: Vec<u64>,
        random_seed: i32,
        logic_server: &str,
    ) -> Result<Arc<Room>, RoomError> {
        let (room, driver) = Room::new(
            room_id,
            type_id,
            roster,
            random_seed,
            logic_server.to_string(),
        );
        {
            let mut rooms = self.rooms.write().expect("room map lock poisoned");
            if rooms.contains_key(&room_id) {
                return Err(RoomError::Exists(room_id));
            }
            rooms.insert(room_id, Arc::clone(&room));
        }

        let rooms = Arc::clone(&self.rooms);
        self.drivers
            .lock()
            .expect("driver set lock poisoned")
            .spawn(async move {
                driver.run().await;
                rooms
                    .write()
                    .expect("room map lock poisoned")
                    .remove(&room_id);
                info!(room_id, "room unregistered");
            });

        info!(room_id, "room created");
        Ok(room)
    }

    /// The room with this id, if it is still live.
    pub fn get(&self, room_id: u64) -> Option<Arc<Room>> {
        self.rooms
            .read()
            .expect("room map lock poisoned")
            .get(&room_id)
            .cloned()
    }

    /// Number of live rooms.
    pub fn count(&self) -> usize {
        self.rooms.read().expect("room map lock poisoned").len()
    }

    /// Signals every room to exit, clears the registry, and waits for all
    /// room loops to finish.
    pub async fn stop_all(&self) {
        {
            let mut rooms = self.rooms.write().expect("room map lock poisoned");
            for room in rooms.values() {
                room.stop();
            }
            rooms.clear();
        }
        let mut drivers =
            std::mem::take(&mut *self.drivers.lock().expect("driver set lock poisoned"));
        while drivers.join_next().await.is_some() {}
        info!("all rooms stopped");
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
