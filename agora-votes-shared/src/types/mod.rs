mod outcome;
mod score_event;
mod target;
mod user_vote;
mod vote_type;
mod votes_count;

pub use outcome::{CastVoteOutcome, VoteAction};
pub use score_event::ScoreChangeEvent;
pub use target::{TargetId, TargetInfo, TargetRef, TargetType};
pub use user_vote::{UserVote, VoteKey};
pub use vote_type::{InvalidVoteType, VoteType};
pub use votes_count::{ScoreSnapshot, VoteTally};
