use std::time::Duration;

use agora_votes_repository::VoteStoreError;
use agora_votes_shared::types::{InvalidVoteType, TargetRef, VoteKey};
use thiserror::Error;

use crate::errors::AggregatorError;

/// Errors surfaced by `VoteService`.
///
/// Validation variants are raised before any store access. A lost insert race
/// (`VoteStoreError::DuplicateVote`) is retried inside the service and never
/// reaches the caller.
#[derive(Debug, Error)]
pub enum VoteServiceError {
    #[error(transparent)]
    InvalidVoteType(#[from] InvalidVoteType),

    #[error("User ID is required")]
    MissingUserId,

    #[error("Target not found: {0}")]
    TargetNotFound(TargetRef),

    #[error("Vote not found: {0}")]
    VoteNotFound(VoteKey),

    #[error("Vote operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Vote store error: {0}")]
    Store(VoteStoreError),
}

impl VoteServiceError {
    /// Whether the error stems from bad caller input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidVoteType(_) | Self::MissingUserId)
    }

    /// Whether the error is the typed signal of a lost insert race.
    pub fn is_duplicate_vote(&self) -> bool {
        matches!(self, Self::Store(VoteStoreError::DuplicateVote(_)))
    }
}

impl From<VoteStoreError> for VoteServiceError {
    fn from(error: VoteStoreError) -> Self {
        match error {
            VoteStoreError::TargetNotFound(target) => Self::TargetNotFound(target),
            VoteStoreError::VoteNotFound(key) => Self::VoteNotFound(key),
            other => Self::Store(other),
        }
    }
}

impl From<AggregatorError> for VoteServiceError {
    fn from(error: AggregatorError) -> Self {
        match error {
            AggregatorError::TargetNotFound(target) => Self::TargetNotFound(target),
            AggregatorError::Store(store) => store.into(),
        }
    }
}
