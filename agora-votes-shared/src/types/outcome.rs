use serde::{Deserialize, Serialize};

use crate::types::{ScoreSnapshot, VoteType};

/// Which transition a cast performed on the vote store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    /// No prior vote existed; a new row was inserted.
    Recorded,
    /// The existing vote flipped direction, or a raced insert converged on it.
    Updated,
    /// The same type was cast again and the vote was toggled off.
    Removed,
}

/// Result of casting a vote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CastVoteOutcome {
    pub action: VoteAction,
    /// The user's vote after the cast, `None` when toggled off.
    pub vote: Option<VoteType>,
    pub snapshot: ScoreSnapshot,
}
