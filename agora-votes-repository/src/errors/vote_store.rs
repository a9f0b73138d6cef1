//! Error types for the vote store.
//! Defines the errors that can occur while reading or mutating vote rows and
//! target score snapshots.
use agora_votes_shared::types::{TargetRef, VoteKey};
use thiserror::Error;

/// Represents errors that can occur within the vote store.
///
/// `DuplicateVote` is the typed signal of a lost insert race on the natural
/// key; callers recover from it by re-reading the key in a fresh transaction.
#[derive(Debug, Error)]
pub enum VoteStoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Vote already exists: {0}")]
    DuplicateVote(VoteKey),

    #[error("Vote not found: {0}")]
    VoteNotFound(VoteKey),

    #[error("Target not found: {0}")]
    TargetNotFound(TargetRef),

    #[error("Invalid vote type: {0}")]
    InvalidVoteType(i16),
}

impl VoteStoreError {
    /// Classifies a write error on the natural key.
    ///
    /// Unique violations become `DuplicateVote` and foreign key violations
    /// (the target row is gone) become `TargetNotFound`.
    pub fn from_write(error: sqlx::Error, key: &VoteKey) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                return Self::DuplicateVote(key.clone());
            }
            if db_error.is_foreign_key_violation() {
                return Self::TargetNotFound(key.target);
            }
        }
        Self::DatabaseError(error)
    }
}
