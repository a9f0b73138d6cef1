use serde::{Deserialize, Serialize};

use crate::types::VoteType;

/// Raw counts of vote rows for a single target, partitioned by vote type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteTally {
    pub upvotes: i64,
    pub downvotes: i64,
}

impl VoteTally {
    /// Counts a sequence of vote types.
    pub fn from_votes<I>(votes: I) -> Self
    where
        I: IntoIterator<Item = VoteType>,
    {
        votes.into_iter().fold(Self::default(), |mut tally, vote| {
            match vote {
                VoteType::Upvote => tally.upvotes += 1,
                VoteType::Downvote => tally.downvotes += 1,
            }
            tally
        })
    }

    pub fn total(&self) -> i64 {
        self.upvotes + self.downvotes
    }
}

/// The tally materialized on a target record.
///
/// Always derived from the vote rows; `score` is `upvotes - downvotes`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreSnapshot {
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

impl From<VoteTally> for ScoreSnapshot {
    fn from(tally: VoteTally) -> Self {
        Self {
            upvotes: tally.upvotes,
            downvotes: tally.downvotes,
            score: tally.upvotes - tally.downvotes,
        }
    }
}
