use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{TargetRef, VoteType};

/// Natural key of a vote: one row per (target type, target id, user).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VoteKey {
    pub target: TargetRef,
    pub user_id: String,
}

impl VoteKey {
    pub fn new(target: TargetRef, user_id: impl Into<String>) -> Self {
        Self {
            target,
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for VoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target, self.user_id)
    }
}

/// Represents a user's vote on a discussion or reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserVote {
    pub key: VoteKey,
    pub vote_type: VoteType,
    pub updated_at: DateTime<Utc>,
}

impl UserVote {
    pub fn new(key: VoteKey, vote_type: VoteType) -> Self {
        Self {
            key,
            vote_type,
            updated_at: Utc::now(),
        }
    }
}
