//! Real-time propagation of score changes.
//!
//! `ScoreNotifier` is the seam the vote service publishes through once a
//! mutation has committed. `RoomRegistry` is the in-process implementation: one
//! broadcast channel per discussion room, created on the first subscription and
//! dropped with the last one.
mod rooms;

pub use rooms::{RoomRegistry, RoomSubscription};

use agora_votes_shared::types::ScoreChangeEvent;

/// Delivers score changes to clients viewing the containing discussion.
///
/// Delivery is best effort: `publish` must not block, does not retry, and
/// drops the event when nobody is listening.
pub trait ScoreNotifier: Send + Sync {
    fn publish(&self, event: &ScoreChangeEvent);
}

/// A notifier that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ScoreNotifier for NoopNotifier {
    fn publish(&self, _event: &ScoreChangeEvent) {}
}
