use agora_votes_repository::VoteStoreError;
use agora_votes_shared::types::TargetRef;
use thiserror::Error;

/// Errors raised while recomputing a target's score snapshot.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// The target was deleted before its snapshot could be written.
    #[error("Target not found: {0}")]
    TargetNotFound(TargetRef),

    #[error("Vote store error: {0}")]
    Store(VoteStoreError),
}

impl From<VoteStoreError> for AggregatorError {
    fn from(error: VoteStoreError) -> Self {
        match error {
            VoteStoreError::TargetNotFound(target) => Self::TargetNotFound(target),
            other => Self::Store(other),
        }
    }
}
