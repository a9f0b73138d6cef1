//! This module defines the `VoteRepository` and `VoteTransaction` traits, which
//! provide an interface over vote rows and the score snapshots materialized on
//! discussions and replies. It abstracts the database operations so the vote
//! service can run against PostgreSQL or the in-memory store.
use agora_votes_shared::ranking::Ranking;
use agora_votes_shared::types::{
    ScoreSnapshot, TargetInfo, TargetRef, UserVote, VoteKey, VoteTally, VoteType,
};

use crate::errors::VoteStoreError;

/// Entry point to the vote store.
///
/// Reads outside a transaction are used for display only. Every mutation goes
/// through a `VoteTransaction` obtained from `begin`.
#[async_trait::async_trait]
pub trait VoteRepository: Send + Sync {
    /// Opens a new unit of work.
    ///
    /// # Returns
    ///
    /// A boxed `VoteTransaction`. Dropping it without calling `commit`
    /// discards every change made through it.
    async fn begin(&self) -> Result<Box<dyn VoteTransaction>, VoteStoreError>;

    /// Retrieves the current vote for a natural key, if any.
    ///
    /// # Arguments
    ///
    /// * `key` - The (target, user) pair to look up
    async fn find_vote(&self, key: &VoteKey) -> Result<Option<UserVote>, VoteStoreError>;

    /// Retrieves the score snapshot stored on a target.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(ScoreSnapshot))` - The stored snapshot
    /// * `Ok(None)` - The target does not exist
    async fn get_snapshot(&self, target: TargetRef)
    -> Result<Option<ScoreSnapshot>, VoteStoreError>;

    /// Checks if the vote tables are created in the database.
    async fn check_tables_created(&self) -> Result<bool, VoteStoreError>;
}

/// A single atomic unit of work against the vote store.
///
/// Implementations hold a row-level lock on every natural key they insert,
/// update or remove, and an exclusive lock on every target passed to
/// `lock_target`, until the transaction ends. Callers must take key locks
/// before target locks.
///
/// Vote writes may also take a shared lock on their target row (PostgreSQL
/// does so for the foreign key check). The `lock_target` lock must not
/// conflict with it, otherwise two writers on one target deadlock.
#[async_trait::async_trait]
pub trait VoteTransaction: Send {
    /// Reads what the vote subsystem needs to know about a target without
    /// locking it.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the target does not exist.
    async fn target_info(&mut self, target: TargetRef)
    -> Result<Option<TargetInfo>, VoteStoreError>;

    /// Like `target_info`, but holds the target row lock until the
    /// transaction ends. Serializes score recomputation per target.
    async fn lock_target(&mut self, target: TargetRef)
    -> Result<Option<TargetInfo>, VoteStoreError>;

    /// Finds the vote stored under `key`. No side effects.
    async fn find(&mut self, key: &VoteKey) -> Result<Option<UserVote>, VoteStoreError>;

    /// Inserts a new vote row.
    ///
    /// # Errors
    ///
    /// * `VoteStoreError::DuplicateVote` - A row with the same natural key exists
    /// * `VoteStoreError::TargetNotFound` - The target row does not exist
    async fn insert(&mut self, vote: &UserVote) -> Result<(), VoteStoreError>;

    /// Changes the type of an existing vote and bumps its `updated_at`.
    ///
    /// # Errors
    ///
    /// * `VoteStoreError::VoteNotFound` - No row matches `key`
    async fn update_type(&mut self, key: &VoteKey, vote_type: VoteType)
    -> Result<(), VoteStoreError>;

    /// Deletes an existing vote.
    ///
    /// # Errors
    ///
    /// * `VoteStoreError::VoteNotFound` - No row matches `key`
    async fn remove(&mut self, key: &VoteKey) -> Result<(), VoteStoreError>;

    /// Deletes every vote cast by `user_id`.
    ///
    /// # Returns
    ///
    /// The distinct targets that lost at least one vote, so their snapshots can
    /// be recomputed in the same transaction.
    async fn remove_all_for_user(&mut self, user_id: &str)
    -> Result<Vec<TargetRef>, VoteStoreError>;

    /// Counts the vote rows of a target, partitioned by vote type, as seen by
    /// this transaction.
    async fn count_votes(&mut self, target: TargetRef) -> Result<VoteTally, VoteStoreError>;

    /// Writes the score snapshot, and the ranking when given, onto the target.
    ///
    /// # Errors
    ///
    /// * `VoteStoreError::TargetNotFound` - The target row no longer exists
    async fn store_snapshot(
        &mut self,
        target: TargetRef,
        snapshot: &ScoreSnapshot,
        ranking: Option<&Ranking>,
    ) -> Result<(), VoteStoreError>;

    /// Makes every change of this transaction visible and releases its locks.
    async fn commit(self: Box<Self>) -> Result<(), VoteStoreError>;

    /// Discards every change of this transaction and releases its locks.
    async fn rollback(self: Box<Self>) -> Result<(), VoteStoreError>;
}
