use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use agora_votes_shared::ranking::Ranking;
use agora_votes_shared::types::{
    ScoreSnapshot, TargetId, TargetInfo, TargetRef, TargetType, UserVote, VoteKey, VoteTally,
    VoteType,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::{VoteRepository, VoteStoreError, VoteTransaction};

#[derive(Debug, Clone)]
struct MemoryTarget {
    discussion_id: TargetId,
    created_at: DateTime<Utc>,
    snapshot: ScoreSnapshot,
    ranking: Option<Ranking>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: TargetId,
    targets: HashMap<TargetRef, MemoryTarget>,
    votes: HashMap<VoteKey, UserVote>,
}

impl MemoryState {
    fn info(&self, target: TargetRef) -> Option<TargetInfo> {
        self.targets.get(&target).map(|t| TargetInfo {
            target,
            discussion_id: t.discussion_id,
            created_at: t.created_at,
        })
    }

    fn allocate_id(&mut self) -> TargetId {
        self.next_id += 1;
        self.next_id
    }
}

/// Row locks, one async mutex per natural key and per target.
///
/// An entry lives while some transaction holds or waits for its lock.
struct LockTable<K> {
    entries: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> LockTable<K> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(self: &Arc<Self>, key: &K) -> RowGuard<K> {
        let mutex = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.entry(key.clone()).or_default().clone()
        };
        RowGuard {
            key: key.clone(),
            guard: Some(mutex.lock_owned().await),
            table: Arc::clone(self),
        }
    }

    /// Drops the entry for `key` when only the table still references it.
    fn release(&self, key: &K) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            entries.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A held row lock.
struct RowGuard<K: Eq + Hash + Clone> {
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable<K>>,
}

impl<K: Eq + Hash + Clone> Drop for RowGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.table.release(&self.key);
    }
}

struct Locks {
    keys: Arc<LockTable<VoteKey>>,
    targets: Arc<LockTable<TargetRef>>,
}

/// In-memory vote store.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct InMemoryVoteRepository {
    state: Arc<RwLock<MemoryState>>,
    locks: Arc<Locks>,
}

impl Default for InMemoryVoteRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVoteRepository {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            locks: Arc::new(Locks {
                keys: Arc::new(LockTable::new()),
                targets: Arc::new(LockTable::new()),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a discussion with a zero snapshot and returns its id.
    pub fn create_discussion(&self, created_at: DateTime<Utc>) -> TargetId {
        let mut state = self.write();
        let id = state.allocate_id();
        state.targets.insert(
            TargetRef::discussion(id),
            MemoryTarget {
                discussion_id: id,
                created_at,
                snapshot: ScoreSnapshot::default(),
                ranking: Some(Ranking::default()),
            },
        );
        id
    }

    /// Creates a reply inside `discussion_id` and returns its id.
    pub fn create_reply(&self, discussion_id: TargetId) -> Result<TargetId, VoteStoreError> {
        let mut state = self.write();
        let parent = TargetRef::discussion(discussion_id);
        if !state.targets.contains_key(&parent) {
            return Err(VoteStoreError::TargetNotFound(parent));
        }

        let id = state.allocate_id();
        state.targets.insert(
            TargetRef::reply(id),
            MemoryTarget {
                discussion_id,
                created_at: Utc::now(),
                snapshot: ScoreSnapshot::default(),
                ranking: None,
            },
        );
        Ok(id)
    }

    /// Deletes a target together with its votes; a discussion also takes its
    /// replies with it.
    pub fn delete_target(&self, target: TargetRef) -> bool {
        let mut state = self.write();
        if state.targets.remove(&target).is_none() {
            return false;
        }

        if target.target_type == TargetType::Discussion {
            state.targets.retain(|t, row| {
                !(t.target_type == TargetType::Reply && row.discussion_id == target.target_id)
            });
        }
        let MemoryState { targets, votes, .. } = &mut *state;
        votes.retain(|key, _| targets.contains_key(&key.target));
        true
    }

    /// Number of committed vote rows on `target`.
    pub fn vote_count(&self, target: TargetRef) -> usize {
        self.read()
            .votes
            .keys()
            .filter(|key| key.target == target)
            .count()
    }

    /// Ranking stored on `target`, `None` for replies and unknown targets.
    pub fn ranking(&self, target: TargetRef) -> Option<Ranking> {
        self.read().targets.get(&target).and_then(|t| t.ranking)
    }
}

#[async_trait]
impl VoteRepository for InMemoryVoteRepository {
    async fn begin(&self) -> Result<Box<dyn VoteTransaction>, VoteStoreError> {
        Ok(Box::new(InMemoryVoteTransaction {
            repository: self.clone(),
            key_guards: HashMap::new(),
            target_guards: HashMap::new(),
            staged_votes: HashMap::new(),
            staged_snapshots: HashMap::new(),
        }))
    }

    async fn find_vote(&self, key: &VoteKey) -> Result<Option<UserVote>, VoteStoreError> {
        Ok(self.read().votes.get(key).cloned())
    }

    async fn get_snapshot(
        &self,
        target: TargetRef,
    ) -> Result<Option<ScoreSnapshot>, VoteStoreError> {
        Ok(self.read().targets.get(&target).map(|t| t.snapshot))
    }

    async fn check_tables_created(&self) -> Result<bool, VoteStoreError> {
        Ok(true)
    }
}

/// A unit of work against `InMemoryVoteRepository`.
///
/// Writes are staged and applied on `commit`; dropping the transaction
/// discards them and releases its locks.
pub struct InMemoryVoteTransaction {
    repository: InMemoryVoteRepository,
    key_guards: HashMap<VoteKey, RowGuard<VoteKey>>,
    target_guards: HashMap<TargetRef, RowGuard<TargetRef>>,
    staged_votes: HashMap<VoteKey, Option<UserVote>>,
    staged_snapshots: HashMap<TargetRef, (ScoreSnapshot, Option<Ranking>)>,
}

impl InMemoryVoteTransaction {
    async fn lock_key(&mut self, key: &VoteKey) {
        if !self.key_guards.contains_key(key) {
            let guard = self.repository.locks.keys.acquire(key).await;
            self.key_guards.insert(key.clone(), guard);
        }
    }

    /// The vote under `key` as this transaction sees it.
    fn current(&self, key: &VoteKey) -> Option<UserVote> {
        match self.staged_votes.get(key) {
            Some(staged) => staged.clone(),
            None => self.repository.read().votes.get(key).cloned(),
        }
    }
}

#[async_trait]
impl VoteTransaction for InMemoryVoteTransaction {
    async fn target_info(
        &mut self,
        target: TargetRef,
    ) -> Result<Option<TargetInfo>, VoteStoreError> {
        Ok(self.repository.read().info(target))
    }

    async fn lock_target(
        &mut self,
        target: TargetRef,
    ) -> Result<Option<TargetInfo>, VoteStoreError> {
        if !self.target_guards.contains_key(&target) {
            let guard = self.repository.locks.targets.acquire(&target).await;
            self.target_guards.insert(target, guard);
        }
        Ok(self.repository.read().info(target))
    }

    async fn find(&mut self, key: &VoteKey) -> Result<Option<UserVote>, VoteStoreError> {
        Ok(self.current(key))
    }

    async fn insert(&mut self, vote: &UserVote) -> Result<(), VoteStoreError> {
        self.lock_key(&vote.key).await;

        if !self.repository.read().targets.contains_key(&vote.key.target) {
            return Err(VoteStoreError::TargetNotFound(vote.key.target));
        }
        if self.current(&vote.key).is_some() {
            return Err(VoteStoreError::DuplicateVote(vote.key.clone()));
        }

        self.staged_votes.insert(vote.key.clone(), Some(vote.clone()));
        debug!(key = %vote.key, vote_type = %vote.vote_type, "Inserted vote");
        Ok(())
    }

    async fn update_type(
        &mut self,
        key: &VoteKey,
        vote_type: VoteType,
    ) -> Result<(), VoteStoreError> {
        self.lock_key(key).await;

        let mut vote = self
            .current(key)
            .ok_or_else(|| VoteStoreError::VoteNotFound(key.clone()))?;
        vote.vote_type = vote_type;
        vote.updated_at = Utc::now();
        self.staged_votes.insert(key.clone(), Some(vote));
        Ok(())
    }

    async fn remove(&mut self, key: &VoteKey) -> Result<(), VoteStoreError> {
        self.lock_key(key).await;

        if self.current(key).is_none() {
            return Err(VoteStoreError::VoteNotFound(key.clone()));
        }
        self.staged_votes.insert(key.clone(), None);
        Ok(())
    }

    async fn remove_all_for_user(
        &mut self,
        user_id: &str,
    ) -> Result<Vec<TargetRef>, VoteStoreError> {
        let mut keys: Vec<VoteKey> = {
            let state = self.repository.read();
            state
                .votes
                .keys()
                .filter(|key| key.user_id == user_id)
                .cloned()
                .collect()
        };
        keys.extend(
            self.staged_votes
                .iter()
                .filter(|(key, vote)| key.user_id == user_id && vote.is_some())
                .map(|(key, _)| key.clone()),
        );
        keys.sort_by_key(|key| (key.target.target_type == TargetType::Reply, key.target.target_id));
        keys.dedup();

        let mut affected = Vec::new();
        for key in keys {
            self.lock_key(&key).await;
            if self.current(&key).is_some() {
                self.staged_votes.insert(key.clone(), None);
                affected.push(key.target);
            }
        }

        Ok(affected)
    }

    async fn count_votes(&mut self, target: TargetRef) -> Result<VoteTally, VoteStoreError> {
        let committed: Vec<VoteType> = {
            let state = self.repository.read();
            state
                .votes
                .values()
                .filter(|vote| {
                    vote.key.target == target && !self.staged_votes.contains_key(&vote.key)
                })
                .map(|vote| vote.vote_type)
                .collect()
        };
        let staged = self
            .staged_votes
            .iter()
            .filter(|(key, _)| key.target == target)
            .filter_map(|(_, vote)| vote.as_ref().map(|v| v.vote_type));

        Ok(VoteTally::from_votes(committed.into_iter().chain(staged)))
    }

    async fn store_snapshot(
        &mut self,
        target: TargetRef,
        snapshot: &ScoreSnapshot,
        ranking: Option<&Ranking>,
    ) -> Result<(), VoteStoreError> {
        if !self.repository.read().targets.contains_key(&target) {
            return Err(VoteStoreError::TargetNotFound(target));
        }
        self.staged_snapshots
            .insert(target, (*snapshot, ranking.copied()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), VoteStoreError> {
        let mut state = self.repository.write();
        let MemoryState { targets, votes, .. } = &mut *state;

        for (key, vote) in &self.staged_votes {
            match vote {
                Some(vote) if targets.contains_key(&key.target) => {
                    votes.insert(key.clone(), vote.clone());
                }
                Some(_) => {}
                None => {
                    votes.remove(key);
                }
            }
        }

        for (target, (snapshot, ranking)) in &self.staged_snapshots {
            if let Some(row) = targets.get_mut(target) {
                row.snapshot = *snapshot;
                if ranking.is_some() {
                    row.ranking = *ranking;
                }
            }
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), VoteStoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn repository_with_discussion() -> (InMemoryVoteRepository, TargetRef) {
        let repository = InMemoryVoteRepository::new();
        let id = repository.create_discussion(Utc::now());
        (repository, TargetRef::discussion(id))
    }

    #[tokio::test]
    async fn test_uncommitted_insert_is_invisible() {
        let (repository, target) = repository_with_discussion();
        let key = VoteKey::new(target, "alice");

        let mut tx = repository.begin().await.unwrap();
        tx.insert(&UserVote::new(key.clone(), VoteType::Upvote))
            .await
            .unwrap();

        assert!(tx.find(&key).await.unwrap().is_some());
        assert!(repository.find_vote(&key).await.unwrap().is_none());

        drop(tx);
        assert!(repository.find_vote(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_applies_votes_and_snapshot() {
        let (repository, target) = repository_with_discussion();
        let key = VoteKey::new(target, "alice");

        let mut tx = repository.begin().await.unwrap();
        tx.insert(&UserVote::new(key.clone(), VoteType::Downvote))
            .await
            .unwrap();
        tx.lock_target(target).await.unwrap();
        let tally = tx.count_votes(target).await.unwrap();
        assert_eq!(tally, VoteTally { upvotes: 0, downvotes: 1 });
        tx.store_snapshot(target, &tally.into(), None).await.unwrap();
        tx.commit().await.unwrap();

        let stored = repository.find_vote(&key).await.unwrap().unwrap();
        assert_eq!(stored.vote_type, VoteType::Downvote);
        let snapshot = repository.get_snapshot(target).await.unwrap().unwrap();
        assert_eq!(snapshot.score, -1);
    }

    #[tokio::test]
    async fn test_second_insert_on_same_key_is_duplicate() {
        let (repository, target) = repository_with_discussion();
        let key = VoteKey::new(target, "alice");

        let mut first = repository.begin().await.unwrap();
        first
            .insert(&UserVote::new(key.clone(), VoteType::Upvote))
            .await
            .unwrap();

        let contender = {
            let repository = repository.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let mut second = repository.begin().await.unwrap();
                second
                    .insert(&UserVote::new(key, VoteType::Upvote))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished(), "second insert must wait on the key");

        first.commit().await.unwrap();
        let result = contender.await.unwrap();
        assert!(matches!(result, Err(VoteStoreError::DuplicateVote(k)) if k == key));
    }

    #[tokio::test]
    async fn test_row_locks_are_dropped_with_their_last_holder() {
        let (repository, target) = repository_with_discussion();
        let key = VoteKey::new(target, "alice");

        let mut first = repository.begin().await.unwrap();
        first
            .insert(&UserVote::new(key.clone(), VoteType::Upvote))
            .await
            .unwrap();
        first.lock_target(target).await.unwrap();

        let waiter = {
            let repository = repository.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let mut second = repository.begin().await.unwrap();
                second.update_type(&key, VoteType::Downvote).await.unwrap();
                second.commit().await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        first.commit().await.unwrap();
        assert_eq!(repository.locks.targets.len(), 0);

        waiter.await.unwrap();
        assert_eq!(repository.locks.keys.len(), 0);
        assert_eq!(
            repository.find_vote(&key).await.unwrap().map(|v| v.vote_type),
            Some(VoteType::Downvote)
        );
    }

    #[tokio::test]
    async fn test_update_and_remove_require_existing_vote() {
        let (repository, target) = repository_with_discussion();
        let key = VoteKey::new(target, "bob");

        let mut tx = repository.begin().await.unwrap();
        assert!(matches!(
            tx.update_type(&key, VoteType::Upvote).await,
            Err(VoteStoreError::VoteNotFound(_))
        ));
        assert!(matches!(
            tx.remove(&key).await,
            Err(VoteStoreError::VoteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_on_missing_target_fails() {
        let repository = InMemoryVoteRepository::new();
        let key = VoteKey::new(TargetRef::reply(42), "carol");

        let mut tx = repository.begin().await.unwrap();
        assert!(matches!(
            tx.insert(&UserVote::new(key, VoteType::Upvote)).await,
            Err(VoteStoreError::TargetNotFound(t)) if t == TargetRef::reply(42)
        ));
    }

    #[tokio::test]
    async fn test_delete_discussion_cascades_to_replies_and_votes() {
        let (repository, discussion) = repository_with_discussion();
        let reply = TargetRef::reply(repository.create_reply(discussion.target_id).unwrap());

        let mut tx = repository.begin().await.unwrap();
        tx.insert(&UserVote::new(VoteKey::new(discussion, "a"), VoteType::Upvote))
            .await
            .unwrap();
        tx.insert(&UserVote::new(VoteKey::new(reply, "a"), VoteType::Upvote))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(repository.delete_target(discussion));
        assert_eq!(repository.vote_count(discussion), 0);
        assert_eq!(repository.vote_count(reply), 0);
        assert!(repository.get_snapshot(reply).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_all_for_user_reports_targets() {
        let (repository, discussion) = repository_with_discussion();
        let reply = TargetRef::reply(repository.create_reply(discussion.target_id).unwrap());

        let mut tx = repository.begin().await.unwrap();
        tx.insert(&UserVote::new(VoteKey::new(reply, "dave"), VoteType::Downvote))
            .await
            .unwrap();
        tx.insert(&UserVote::new(VoteKey::new(discussion, "dave"), VoteType::Upvote))
            .await
            .unwrap();
        tx.insert(&UserVote::new(VoteKey::new(discussion, "erin"), VoteType::Upvote))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = repository.begin().await.unwrap();
        let affected = tx.remove_all_for_user("dave").await.unwrap();
        assert_eq!(affected, vec![discussion, reply]);
        assert_eq!(
            tx.count_votes(discussion).await.unwrap(),
            VoteTally { upvotes: 1, downvotes: 0 }
        );
        tx.commit().await.unwrap();

        assert_eq!(repository.vote_count(discussion), 1);
        assert_eq!(repository.vote_count(reply), 0);
    }
}
