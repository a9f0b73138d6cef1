//! Shared fixtures for the vote service integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agora_votes_repository::{
    InMemoryVoteRepository, VoteRepository, VoteStoreError, VoteTransaction,
};
use agora_votes_service::{ScoreNotifier, VoteService, VoteServiceConfig};
use agora_votes_shared::ranking::Ranking;
use agora_votes_shared::types::{
    ScoreChangeEvent, ScoreSnapshot, TargetInfo, TargetRef, UserVote, VoteKey, VoteTally,
    VoteType,
};
use async_trait::async_trait;
use tokio::sync::Barrier;

/// Notifier that keeps every published event.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ScoreChangeEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<ScoreChangeEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ScoreNotifier for RecordingNotifier {
    fn publish(&self, event: &ScoreChangeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub struct Fixture {
    pub repository: InMemoryVoteRepository,
    pub notifier: Arc<RecordingNotifier>,
    pub service: Arc<VoteService>,
}

impl Fixture {
    pub fn new() -> Self {
        let repository = InMemoryVoteRepository::new();
        let store = Arc::new(repository.clone());
        Self::with_repository(repository, store, VoteServiceConfig::default())
    }

    pub fn with_repository(
        repository: InMemoryVoteRepository,
        store: Arc<dyn VoteRepository>,
        config: VoteServiceConfig,
    ) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = Arc::new(VoteService::with_config(store, notifier.clone(), config));
        Self {
            repository,
            notifier,
            service,
        }
    }

    pub fn discussion(&self) -> TargetRef {
        TargetRef::discussion(self.repository.create_discussion(chrono::Utc::now()))
    }

    pub async fn snapshot(&self, target: TargetRef) -> ScoreSnapshot {
        self.repository.get_snapshot(target).await.unwrap().unwrap()
    }

    /// Asserts the stored snapshot matches the committed vote rows.
    pub async fn assert_consistent(&self, target: TargetRef) {
        let snapshot = self.snapshot(target).await;
        assert_eq!(snapshot.score, snapshot.upvotes - snapshot.downvotes);
        assert_eq!(
            (snapshot.upvotes + snapshot.downvotes) as usize,
            self.repository.vote_count(target)
        );
    }
}

/// Interference injected into the transactions of a `HookedRepository`.
#[derive(Clone)]
pub enum Hook {
    /// The first `gated` transactions wait on the barrier right after `find`,
    /// so they all observe the same existing vote.
    BarrierAfterFind {
        barrier: Arc<Barrier>,
        gated: Arc<AtomicUsize>,
    },
    /// `lock_target` sleeps before taking the lock.
    DelayLockTarget(Duration),
    /// The target is deleted just before `lock_target`.
    DeleteBeforeLock,
    /// The next `n` inserts fail as if a concurrent cast had just committed
    /// the same natural key.
    ConflictingInserts(Arc<AtomicUsize>),
}

impl Hook {
    pub fn barrier(parties: usize) -> Self {
        Hook::BarrierAfterFind {
            barrier: Arc::new(Barrier::new(parties)),
            gated: Arc::new(AtomicUsize::new(parties)),
        }
    }

    pub fn conflicts(n: usize) -> Self {
        Hook::ConflictingInserts(Arc::new(AtomicUsize::new(n)))
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Wraps a vote store and injects a `Hook` into its transactions.
pub struct HookedRepository {
    pub inner: Arc<dyn VoteRepository>,
    /// Handle used by `Hook::DeleteBeforeLock` to delete targets.
    pub memory: Option<InMemoryVoteRepository>,
    pub hook: Hook,
}

#[async_trait]
impl VoteRepository for HookedRepository {
    async fn begin(&self) -> Result<Box<dyn VoteTransaction>, VoteStoreError> {
        let hook = match &self.hook {
            Hook::BarrierAfterFind { gated, .. } => take_one(gated).then(|| self.hook.clone()),
            other => Some(other.clone()),
        };

        Ok(Box::new(HookedTransaction {
            inner: self.inner.begin().await?,
            memory: self.memory.clone(),
            hook,
        }))
    }

    async fn find_vote(&self, key: &VoteKey) -> Result<Option<UserVote>, VoteStoreError> {
        self.inner.find_vote(key).await
    }

    async fn get_snapshot(
        &self,
        target: TargetRef,
    ) -> Result<Option<ScoreSnapshot>, VoteStoreError> {
        self.inner.get_snapshot(target).await
    }

    async fn check_tables_created(&self) -> Result<bool, VoteStoreError> {
        Ok(true)
    }
}

struct HookedTransaction {
    inner: Box<dyn VoteTransaction>,
    memory: Option<InMemoryVoteRepository>,
    hook: Option<Hook>,
}

#[async_trait]
impl VoteTransaction for HookedTransaction {
    async fn target_info(
        &mut self,
        target: TargetRef,
    ) -> Result<Option<TargetInfo>, VoteStoreError> {
        self.inner.target_info(target).await
    }

    async fn lock_target(
        &mut self,
        target: TargetRef,
    ) -> Result<Option<TargetInfo>, VoteStoreError> {
        match &self.hook {
            Some(Hook::DelayLockTarget(delay)) => tokio::time::sleep(*delay).await,
            Some(Hook::DeleteBeforeLock) => {
                if let Some(memory) = &self.memory {
                    memory.delete_target(target);
                }
            }
            _ => {}
        }
        self.inner.lock_target(target).await
    }

    async fn find(&mut self, key: &VoteKey) -> Result<Option<UserVote>, VoteStoreError> {
        let found = self.inner.find(key).await?;
        if let Some(Hook::BarrierAfterFind { barrier, .. }) = &self.hook {
            barrier.wait().await;
        }
        Ok(found)
    }

    async fn insert(&mut self, vote: &UserVote) -> Result<(), VoteStoreError> {
        if let Some(Hook::ConflictingInserts(remaining)) = &self.hook {
            if take_one(remaining) {
                return Err(VoteStoreError::DuplicateVote(vote.key.clone()));
            }
        }
        self.inner.insert(vote).await
    }

    async fn update_type(
        &mut self,
        key: &VoteKey,
        vote_type: VoteType,
    ) -> Result<(), VoteStoreError> {
        self.inner.update_type(key, vote_type).await
    }

    async fn remove(&mut self, key: &VoteKey) -> Result<(), VoteStoreError> {
        self.inner.remove(key).await
    }

    async fn remove_all_for_user(
        &mut self,
        user_id: &str,
    ) -> Result<Vec<TargetRef>, VoteStoreError> {
        self.inner.remove_all_for_user(user_id).await
    }

    async fn count_votes(&mut self, target: TargetRef) -> Result<VoteTally, VoteStoreError> {
        self.inner.count_votes(target).await
    }

    async fn store_snapshot(
        &mut self,
        target: TargetRef,
        snapshot: &ScoreSnapshot,
        ranking: Option<&Ranking>,
    ) -> Result<(), VoteStoreError> {
        self.inner.store_snapshot(target, snapshot, ranking).await
    }

    async fn commit(self: Box<Self>) -> Result<(), VoteStoreError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), VoteStoreError> {
        self.inner.rollback().await
    }
}

/// Builds a fixture whose service runs against a `HookedRepository`.
pub fn hooked(hook: Hook, config: VoteServiceConfig) -> Fixture {
    let repository = InMemoryVoteRepository::new();
    let store = Arc::new(HookedRepository {
        inner: Arc::new(repository.clone()),
        memory: Some(repository.clone()),
        hook,
    });
    Fixture::with_repository(repository, store, config)
}
