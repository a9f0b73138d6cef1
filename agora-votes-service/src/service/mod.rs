//! Vote service implementation.
//!
//! This module provides the single entry point for "user casts vote V on
//! target T". It owns the toggle/change/remove policy and runs every cast as
//! one vote store transaction:
//!
//! 1. check that the target exists,
//! 2. read the existing vote and plan the transition,
//! 3. insert, update or remove the vote row (locking the natural key),
//! 4. recompute the target's snapshot (locking the target),
//! 5. commit, then publish the score change.
//!
//! Two casts racing to insert the same natural key both plan an insert; the
//! loser fails with `DuplicateVote` once the winner commits and is retried in
//! a fresh transaction that converges on the stored vote instead of toggling
//! it. Every conflict means another cast committed, so retries stop once the
//! racing casts are done or the cast timeout elapses.
mod transition;

use std::future::Future;
use std::sync::Arc;

use agora_votes_repository::VoteRepository;
use agora_votes_shared::types::{
    CastVoteOutcome, ScoreChangeEvent, ScoreSnapshot, TargetRef, UserVote, VoteKey, VoteType,
};
use tracing::{info, instrument, warn};

use crate::aggregator::ScoreAggregator;
use crate::config::VoteServiceConfig;
use crate::errors::{AggregatorError, VoteServiceError};
use crate::notifier::ScoreNotifier;

pub use transition::{Attempt, Transition};

/// A committed cast and the score change to publish for it.
struct CommittedCast {
    outcome: CastVoteOutcome,
    event: ScoreChangeEvent,
}

/// The vote service.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and all state
/// lives in the repository and the notifier.
pub struct VoteService {
    repository: Arc<dyn VoteRepository>,
    notifier: Arc<dyn ScoreNotifier>,
    aggregator: ScoreAggregator,
    config: VoteServiceConfig,
}

impl VoteService {
    /// Create a new VoteService with default configuration.
    ///
    /// # Arguments
    ///
    /// * `repository` - The vote store backing the service
    /// * `notifier` - Where committed score changes are published
    pub fn new(repository: Arc<dyn VoteRepository>, notifier: Arc<dyn ScoreNotifier>) -> Self {
        Self::with_config(repository, notifier, VoteServiceConfig::default())
    }

    /// Create a new VoteService with custom configuration.
    pub fn with_config(
        repository: Arc<dyn VoteRepository>,
        notifier: Arc<dyn ScoreNotifier>,
        config: VoteServiceConfig,
    ) -> Self {
        Self {
            repository,
            notifier,
            aggregator: ScoreAggregator::new(),
            config,
        }
    }

    pub fn config(&self) -> &VoteServiceConfig {
        &self.config
    }

    fn validate_user_id(user_id: &str) -> Result<(), VoteServiceError> {
        if user_id.trim().is_empty() {
            return Err(VoteServiceError::MissingUserId);
        }
        Ok(())
    }

    /// Runs `operation` under the configured timeout. The operation's
    /// transaction is dropped, and so rolled back, when the timeout elapses.
    async fn bounded<T, F>(&self, operation: F) -> Result<T, VoteServiceError>
    where
        F: Future<Output = Result<T, VoteServiceError>>,
    {
        match self.config.cast_timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| VoteServiceError::Timeout(limit))?,
            None => operation.await,
        }
    }

    /// Casts `vote_type` for `user_id` on `target`.
    ///
    /// | Existing vote | Action | Resulting vote |
    /// |---|---|---|
    /// | none | insert | `vote_type` |
    /// | same type | remove (toggle-off) | none |
    /// | other type | update | `vote_type` |
    ///
    /// The snapshot is recomputed in the same transaction and returned with
    /// the resulting vote. The score change is published only after commit.
    ///
    /// # Errors
    ///
    /// * `VoteServiceError::MissingUserId` - `user_id` is blank
    /// * `VoteServiceError::TargetNotFound` - The target does not exist, or
    ///   was deleted before its snapshot could be written
    /// * `VoteServiceError::VoteNotFound` - The vote to update or remove was
    ///   removed concurrently
    /// * `VoteServiceError::Timeout` - The transaction did not commit in time
    /// * `VoteServiceError::Store` - Any other vote store failure
    #[instrument(
        skip(self, target),
        fields(
            target_type = %target.target_type,
            target_id = target.target_id,
            action = tracing::field::Empty,
        )
    )]
    pub async fn cast_vote(
        &self,
        target: TargetRef,
        user_id: &str,
        vote_type: VoteType,
    ) -> Result<CastVoteOutcome, VoteServiceError> {
        Self::validate_user_id(user_id)?;
        let key = VoteKey::new(target, user_id);

        let committed = self
            .bounded(async {
                let mut attempt = Attempt::Initial;
                loop {
                    match self.cast_once(&key, vote_type, attempt).await {
                        Err(e) if e.is_duplicate_vote() => {
                            warn!(key = %key, ?attempt, "Lost insert race on natural key; retrying");
                            attempt = Attempt::AfterConflict;
                        }
                        result => break result,
                    }
                }
            })
            .await?;

        tracing::Span::current()
            .record("action", tracing::field::debug(committed.outcome.action));
        info!(
            vote = ?committed.outcome.vote,
            score = committed.outcome.snapshot.score,
            "Vote cast"
        );

        self.notifier.publish(&committed.event);
        Ok(committed.outcome)
    }

    /// One attempt at a cast, in its own transaction.
    async fn cast_once(
        &self,
        key: &VoteKey,
        requested: VoteType,
        attempt: Attempt,
    ) -> Result<CommittedCast, VoteServiceError> {
        let mut tx = self.repository.begin().await?;

        if tx.target_info(key.target).await?.is_none() {
            return Err(VoteServiceError::TargetNotFound(key.target));
        }

        let existing = tx.find(key).await?.map(|vote| vote.vote_type);
        let transition = Transition::plan(existing, requested, attempt);

        match transition {
            Transition::Insert => tx.insert(&UserVote::new(key.clone(), requested)).await?,
            Transition::Update => tx.update_type(key, requested).await?,
            Transition::Remove => tx.remove(key).await?,
            Transition::Keep => {}
        }

        match self.aggregator.recompute(tx.as_mut(), key.target).await {
            Ok(recomputed) => {
                tx.commit().await?;
                Ok(CommittedCast {
                    outcome: CastVoteOutcome {
                        action: transition.action(),
                        vote: transition.resulting_vote(requested),
                        snapshot: recomputed.snapshot,
                    },
                    event: recomputed.event(),
                })
            }
            Err(AggregatorError::TargetNotFound(target)) => {
                // The vote mutation stands; only the score push is skipped.
                tx.commit().await?;
                warn!(%target, "Target vanished before its score was recomputed");
                Err(VoteServiceError::TargetNotFound(target))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the vote `user_id` currently holds on `target`.
    #[instrument(
        skip(self, target),
        fields(target_type = %target.target_type, target_id = target.target_id)
    )]
    pub async fn current_vote(
        &self,
        target: TargetRef,
        user_id: &str,
    ) -> Result<Option<VoteType>, VoteServiceError> {
        Self::validate_user_id(user_id)?;

        let vote = self
            .repository
            .find_vote(&VoteKey::new(target, user_id))
            .await?;
        Ok(vote.map(|vote| vote.vote_type))
    }

    /// Returns the snapshot currently stored on `target`.
    pub async fn current_score(&self, target: TargetRef) -> Result<ScoreSnapshot, VoteServiceError> {
        self.repository
            .get_snapshot(target)
            .await?
            .ok_or(VoteServiceError::TargetNotFound(target))
    }

    /// Deletes every vote of `user_id` and recomputes each affected target in
    /// the same transaction. Targets deleted concurrently are skipped.
    ///
    /// # Returns
    ///
    /// The targets whose snapshots changed, each of which also gets a score
    /// change published after commit.
    #[instrument(skip(self))]
    pub async fn purge_user_votes(&self, user_id: &str) -> Result<Vec<TargetRef>, VoteServiceError> {
        Self::validate_user_id(user_id)?;

        let events = self.bounded(self.purge_once(user_id)).await?;

        info!(targets = events.len(), "Purged user votes");

        let mut targets = Vec::with_capacity(events.len());
        for event in &events {
            self.notifier.publish(event);
            targets.push(TargetRef {
                target_type: event.target_type,
                target_id: event.target_id,
            });
        }
        Ok(targets)
    }

    async fn purge_once(&self, user_id: &str) -> Result<Vec<ScoreChangeEvent>, VoteServiceError> {
        let mut tx = self.repository.begin().await?;
        let affected = tx.remove_all_for_user(user_id).await?;

        let mut events = Vec::with_capacity(affected.len());
        for target in affected {
            match self.aggregator.recompute(tx.as_mut(), target).await {
                Ok(recomputed) => events.push(recomputed.event()),
                Err(AggregatorError::TargetNotFound(target)) => {
                    warn!(%target, "Skipping recompute of deleted target");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        Ok(events)
    }
}
