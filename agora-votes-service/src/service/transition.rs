use agora_votes_shared::types::{VoteAction, VoteType};

/// Which pass of a cast is being planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The first pass, applying the toggle policy.
    Initial,
    /// The retry after losing an insert race. A concurrent cast of the same
    /// request already stored a vote, so the retry makes the stored vote equal
    /// the requested one instead of toggling it off.
    AfterConflict,
}

/// The mutation a cast applies to the vote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Insert,
    Update,
    Remove,
    /// The stored vote already matches; only the snapshot is recomputed.
    Keep,
}

impl Transition {
    /// Plans the transition from the existing vote type to the requested one.
    pub fn plan(existing: Option<VoteType>, requested: VoteType, attempt: Attempt) -> Self {
        match (existing, attempt) {
            (None, _) => Transition::Insert,
            (Some(current), Attempt::Initial) if current == requested => Transition::Remove,
            (Some(current), Attempt::AfterConflict) if current == requested => Transition::Keep,
            (Some(_), _) => Transition::Update,
        }
    }

    /// How the cast is reported to the caller. A converged retry reports the
    /// vote as recorded, which is what its caller asked for.
    pub fn action(&self) -> VoteAction {
        match self {
            Transition::Insert | Transition::Keep => VoteAction::Recorded,
            Transition::Update => VoteAction::Updated,
            Transition::Remove => VoteAction::Removed,
        }
    }

    pub fn resulting_vote(&self, requested: VoteType) -> Option<VoteType> {
        match self {
            Transition::Remove => None,
            _ => Some(requested),
        }
    }
}
