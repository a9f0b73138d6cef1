//! This module defines the `ScoreAggregator`, which derives a target's
//! `ScoreSnapshot` from its vote rows and writes it back onto the target.
//!
//! The snapshot is always recounted from the vote rows visible to the caller's
//! transaction, never adjusted by deltas, so a snapshot stored by a committed
//! transaction always matches the committed vote rows.
use agora_votes_repository::VoteTransaction;
use agora_votes_shared::ranking::Ranking;
use agora_votes_shared::types::{ScoreChangeEvent, ScoreSnapshot, TargetInfo, TargetRef, TargetType};
use tracing::debug;

use crate::errors::AggregatorError;

/// Result of a recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecomputedScore {
    pub info: TargetInfo,
    pub snapshot: ScoreSnapshot,
    /// Present for discussions only.
    pub ranking: Option<Ranking>,
}

impl RecomputedScore {
    /// The score change to broadcast once the transaction has committed.
    pub fn event(&self) -> ScoreChangeEvent {
        ScoreChangeEvent::new(&self.info, self.snapshot)
    }
}

/// Recomputes score snapshots inside a vote store transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreAggregator;

impl ScoreAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Recounts the votes of `target` and persists the resulting snapshot.
    ///
    /// Takes the target lock first, so concurrent recomputations of the same
    /// target run one after the other and each counts every vote committed
    /// before it.
    ///
    /// # Arguments
    ///
    /// * `tx` - The transaction that performed the triggering mutation
    /// * `target` - The target whose snapshot is recomputed
    ///
    /// # Returns
    ///
    /// * `Ok(RecomputedScore)` - The snapshot written by this transaction
    /// * `Err(AggregatorError::TargetNotFound)` - The target no longer exists
    pub async fn recompute(
        &self,
        tx: &mut dyn VoteTransaction,
        target: TargetRef,
    ) -> Result<RecomputedScore, AggregatorError> {
        let info = tx
            .lock_target(target)
            .await?
            .ok_or(AggregatorError::TargetNotFound(target))?;

        let tally = tx.count_votes(target).await?;
        let snapshot = ScoreSnapshot::from(tally);
        let ranking = match target.target_type {
            TargetType::Discussion => Some(Ranking::compute(&snapshot, info.created_at)),
            TargetType::Reply => None,
        };

        tx.store_snapshot(target, &snapshot, ranking.as_ref()).await?;

        debug!(
            target_type = %target.target_type,
            target_id = target.target_id,
            upvotes = snapshot.upvotes,
            downvotes = snapshot.downvotes,
            score = snapshot.score,
            "Recomputed score"
        );

        Ok(RecomputedScore {
            info,
            snapshot,
            ranking,
        })
    }
}
