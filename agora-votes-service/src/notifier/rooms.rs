use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agora_votes_shared::types::{ScoreChangeEvent, TargetId};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_stream::Stream;
use tracing::{debug, warn};

use super::ScoreNotifier;

struct Room {
    sender: broadcast::Sender<ScoreChangeEvent>,
    members: usize,
}

struct RegistryInner {
    rooms: Mutex<HashMap<TargetId, Room>>,
    capacity: usize,
}

/// Registry of discussion rooms keyed by discussion id.
///
/// A room exists exactly while it has at least one `RoomSubscription`.
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RegistryInner>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Events buffered per room before slow subscribers start
    ///   missing them
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                rooms: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
            }),
        }
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<TargetId, Room>> {
        self.inner
            .rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Joins the room of `discussion_id`, creating it if needed.
    pub fn join(&self, discussion_id: TargetId) -> RoomSubscription {
        let receiver = {
            let mut rooms = self.rooms();
            let room = rooms.entry(discussion_id).or_insert_with(|| Room {
                sender: broadcast::channel(self.inner.capacity).0,
                members: 0,
            });
            room.members += 1;
            room.sender.subscribe()
        };

        debug!(discussion_id, "Client joined discussion room");

        RoomSubscription {
            discussion_id,
            receiver,
            registry: self.clone(),
        }
    }

    /// Number of live subscriptions on the room of `discussion_id`.
    pub fn room_size(&self, discussion_id: TargetId) -> usize {
        self.rooms()
            .get(&discussion_id)
            .map_or(0, |room| room.members)
    }

    /// Number of rooms with at least one subscription.
    pub fn active_rooms(&self) -> usize {
        self.rooms().len()
    }

    fn leave(&self, discussion_id: TargetId) {
        let mut rooms = self.rooms();
        if let Some(room) = rooms.get_mut(&discussion_id) {
            room.members = room.members.saturating_sub(1);
            if room.members == 0 {
                rooms.remove(&discussion_id);
            }
        }
        debug!(discussion_id, "Client left discussion room");
    }
}

impl ScoreNotifier for RoomRegistry {
    fn publish(&self, event: &ScoreChangeEvent) {
        let rooms = self.rooms();
        let Some(room) = rooms.get(&event.discussion_id) else {
            return;
        };

        // A send error only means every receiver was dropped in between.
        if let Ok(receivers) = room.sender.send(event.clone()) {
            debug!(
                discussion_id = event.discussion_id,
                target_type = %event.target_type,
                target_id = event.target_id,
                receivers,
                "Published score change"
            );
        }
    }
}

/// Membership in a discussion room. Dropping it leaves the room.
pub struct RoomSubscription {
    discussion_id: TargetId,
    receiver: broadcast::Receiver<ScoreChangeEvent>,
    registry: RoomRegistry,
}

impl RoomSubscription {
    pub fn discussion_id(&self) -> TargetId {
        self.discussion_id
    }

    /// Waits for the next score change in the room.
    ///
    /// Events missed because the subscriber fell behind are skipped. Returns
    /// `None` once the room's channel is closed.
    pub async fn recv(&mut self) -> Option<ScoreChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        discussion_id = self.discussion_id,
                        skipped, "Room subscriber lagged; skipping events"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Turns the subscription into a stream of score changes. The room is left
    /// when the stream is dropped.
    pub fn into_stream(self) -> impl Stream<Item = ScoreChangeEvent> + Send + 'static {
        async_stream::stream! {
            let mut subscription = self;
            while let Some(event) = subscription.recv().await {
                yield event;
            }
        }
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        self.registry.leave(self.discussion_id);
    }
}
