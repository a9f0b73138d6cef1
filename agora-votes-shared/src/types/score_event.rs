use serde::{Deserialize, Serialize};

use crate::types::{ScoreSnapshot, TargetId, TargetInfo, TargetType};

/// Score change pushed to every client viewing the containing discussion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreChangeEvent {
    pub target_id: TargetId,
    pub target_type: TargetType,
    pub discussion_id: TargetId,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

impl ScoreChangeEvent {
    pub fn new(info: &TargetInfo, snapshot: ScoreSnapshot) -> Self {
        Self {
            target_id: info.target.target_id,
            target_type: info.target.target_type,
            discussion_id: info.discussion_id,
            upvotes: snapshot.upvotes,
            downvotes: snapshot.downvotes,
            score: snapshot.score,
        }
    }
}
