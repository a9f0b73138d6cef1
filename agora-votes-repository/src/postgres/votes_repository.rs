use agora_votes_shared::ranking::Ranking;
use agora_votes_shared::types::{
    ScoreSnapshot, TargetId, TargetInfo, TargetRef, TargetType, UserVote, VoteKey, VoteTally,
    VoteType,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{VoteRepository, VoteStoreError, VoteTransaction};

/// Table and column names backing one target type.
struct TargetTables {
    /// Table holding the target rows and their snapshot columns.
    target: &'static str,
    /// Column of `target` that names the containing discussion.
    discussion_column: &'static str,
    /// Table holding the vote rows.
    votes: &'static str,
    /// Column of `votes` referencing the target.
    key_column: &'static str,
}

fn tables(target_type: TargetType) -> TargetTables {
    match target_type {
        TargetType::Discussion => TargetTables {
            target: "discussions",
            discussion_column: "id",
            votes: "discussion_votes",
            key_column: "discussion_id",
        },
        TargetType::Reply => TargetTables {
            target: "replies",
            discussion_column: "discussion_id",
            votes: "reply_votes",
            key_column: "reply_id",
        },
    }
}

fn decode_vote(
    key: &VoteKey,
    vote_type: i16,
    updated_at: DateTime<Utc>,
) -> Result<UserVote, VoteStoreError> {
    let vote_type =
        VoteType::from_i16(vote_type).ok_or(VoteStoreError::InvalidVoteType(vote_type))?;
    Ok(UserVote {
        key: key.clone(),
        vote_type,
        updated_at,
    })
}

/// PostgreSQL implementation of the votes repository.
///
/// Provides read access to votes and snapshots through the pool and opens a
/// `PostgresVoteTransaction` for every mutation.
pub struct PostgresVoteRepository {
    pool: sqlx::PgPool,
}

impl PostgresVoteRepository {
    /// Creates a new PostgreSQL repository instance.
    ///
    /// # Arguments
    ///
    /// * `pool` - Configured PostgreSQL connection pool
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresVoteRepository)` - Ready-to-use repository instance
    /// * `Err(VoteStoreError)` - Future validation errors (currently always succeeds)
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, VoteStoreError> {
        Ok(Self { pool })
    }

    /// Applies the embedded migrations to the connected database.
    pub async fn run_migrations(&self) -> Result<(), VoteStoreError> {
        sqlx::migrate!("src/postgres/migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl VoteRepository for PostgresVoteRepository {
    async fn begin(&self) -> Result<Box<dyn VoteTransaction>, VoteStoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresVoteTransaction { tx }))
    }

    async fn find_vote(&self, key: &VoteKey) -> Result<Option<UserVote>, VoteStoreError> {
        let t = tables(key.target.target_type);
        let sql = format!(
            "SELECT vote_type, updated_at FROM {} WHERE {} = $1 AND user_id = $2",
            t.votes, t.key_column
        );

        let row = sqlx::query_as::<_, (i16, DateTime<Utc>)>(&sql)
            .bind(key.target.target_id)
            .bind(&key.user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(vote_type, updated_at)| decode_vote(key, vote_type, updated_at))
            .transpose()
    }

    async fn get_snapshot(
        &self,
        target: TargetRef,
    ) -> Result<Option<ScoreSnapshot>, VoteStoreError> {
        let t = tables(target.target_type);
        let sql = format!(
            "SELECT upvotes, downvotes, score FROM {} WHERE id = $1",
            t.target
        );

        let row = sqlx::query_as::<_, (i64, i64, i64)>(&sql)
            .bind(target.target_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(upvotes, downvotes, score)| ScoreSnapshot {
            upvotes,
            downvotes,
            score,
        }))
    }

    /// Checks that every table the vote subsystem touches exists.
    async fn check_tables_created(&self) -> Result<bool, VoteStoreError> {
        let tables = ["discussions", "replies", "discussion_votes", "reply_votes"];
        for table in tables {
            let table_exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
            if !table_exists {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A vote store unit of work backed by a PostgreSQL transaction.
///
/// Runs at `READ COMMITTED`: each statement sees rows committed before it
/// started, which is what lets `count_votes` observe every committed vote once
/// `lock_target` has been granted.
pub struct PostgresVoteTransaction {
    tx: sqlx::Transaction<'static, sqlx::Postgres>,
}

impl PostgresVoteTransaction {
    /// Reads a target row, optionally locking it.
    ///
    /// The lock is `FOR NO KEY UPDATE`: vote inserts take `FOR KEY SHARE` on
    /// the target through the foreign key check, and the two modes do not
    /// conflict. Recomputes still exclude each other.
    async fn read_target(
        &mut self,
        target: TargetRef,
        for_update: bool,
    ) -> Result<Option<TargetInfo>, VoteStoreError> {
        let t = tables(target.target_type);
        let sql = format!(
            "SELECT {}, created_at FROM {} WHERE id = $1{}",
            t.discussion_column,
            t.target,
            if for_update { " FOR NO KEY UPDATE" } else { "" }
        );

        let row = sqlx::query_as::<_, (TargetId, DateTime<Utc>)>(&sql)
            .bind(target.target_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(|(discussion_id, created_at)| TargetInfo {
            target,
            discussion_id,
            created_at,
        }))
    }
}

#[async_trait]
impl VoteTransaction for PostgresVoteTransaction {
    async fn target_info(
        &mut self,
        target: TargetRef,
    ) -> Result<Option<TargetInfo>, VoteStoreError> {
        self.read_target(target, false).await
    }

    async fn lock_target(
        &mut self,
        target: TargetRef,
    ) -> Result<Option<TargetInfo>, VoteStoreError> {
        self.read_target(target, true).await
    }

    async fn find(&mut self, key: &VoteKey) -> Result<Option<UserVote>, VoteStoreError> {
        let t = tables(key.target.target_type);
        let sql = format!(
            "SELECT vote_type, updated_at FROM {} WHERE {} = $1 AND user_id = $2",
            t.votes, t.key_column
        );

        let row = sqlx::query_as::<_, (i16, DateTime<Utc>)>(&sql)
            .bind(key.target.target_id)
            .bind(&key.user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|(vote_type, updated_at)| decode_vote(key, vote_type, updated_at))
            .transpose()
    }

    /// Inserts the vote row. A concurrent insert of the same key blocks on the
    /// primary key index until the other transaction ends, then fails here with
    /// `DuplicateVote` if that transaction committed.
    async fn insert(&mut self, vote: &UserVote) -> Result<(), VoteStoreError> {
        let t = tables(vote.key.target.target_type);
        let sql = format!(
            "INSERT INTO {} ({}, user_id, vote_type, updated_at) VALUES ($1, $2, $3, $4)",
            t.votes, t.key_column
        );

        sqlx::query(&sql)
            .bind(vote.key.target.target_id)
            .bind(&vote.key.user_id)
            .bind(vote.vote_type.as_i16())
            .bind(vote.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| VoteStoreError::from_write(e, &vote.key))?;

        debug!(key = %vote.key, vote_type = %vote.vote_type, "Inserted vote");
        Ok(())
    }

    async fn update_type(
        &mut self,
        key: &VoteKey,
        vote_type: VoteType,
    ) -> Result<(), VoteStoreError> {
        let t = tables(key.target.target_type);
        let sql = format!(
            "UPDATE {} SET vote_type = $1, updated_at = NOW() WHERE {} = $2 AND user_id = $3",
            t.votes, t.key_column
        );

        let result = sqlx::query(&sql)
            .bind(vote_type.as_i16())
            .bind(key.target.target_id)
            .bind(&key.user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| VoteStoreError::from_write(e, key))?;

        if result.rows_affected() == 0 {
            return Err(VoteStoreError::VoteNotFound(key.clone()));
        }
        Ok(())
    }

    async fn remove(&mut self, key: &VoteKey) -> Result<(), VoteStoreError> {
        let t = tables(key.target.target_type);
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1 AND user_id = $2",
            t.votes, t.key_column
        );

        let result = sqlx::query(&sql)
            .bind(key.target.target_id)
            .bind(&key.user_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(VoteStoreError::VoteNotFound(key.clone()));
        }
        Ok(())
    }

    async fn remove_all_for_user(
        &mut self,
        user_id: &str,
    ) -> Result<Vec<TargetRef>, VoteStoreError> {
        let mut affected = Vec::new();

        for target_type in [TargetType::Discussion, TargetType::Reply] {
            let t = tables(target_type);
            let sql = format!(
                "DELETE FROM {} WHERE user_id = $1 RETURNING {}",
                t.votes, t.key_column
            );

            let mut ids: Vec<TargetId> = sqlx::query_scalar(&sql)
                .bind(user_id)
                .fetch_all(&mut *self.tx)
                .await?;
            ids.sort_unstable();

            affected.extend(ids.into_iter().map(|target_id| TargetRef {
                target_type,
                target_id,
            }));
        }

        Ok(affected)
    }

    async fn count_votes(&mut self, target: TargetRef) -> Result<VoteTally, VoteStoreError> {
        let t = tables(target.target_type);
        let sql = format!(
            "SELECT COUNT(*) FILTER (WHERE vote_type = 0), COUNT(*) FILTER (WHERE vote_type = 1) \
             FROM {} WHERE {} = $1",
            t.votes, t.key_column
        );

        let (upvotes, downvotes) = sqlx::query_as::<_, (i64, i64)>(&sql)
            .bind(target.target_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(VoteTally { upvotes, downvotes })
    }

    async fn store_snapshot(
        &mut self,
        target: TargetRef,
        snapshot: &ScoreSnapshot,
        ranking: Option<&Ranking>,
    ) -> Result<(), VoteStoreError> {
        let t = tables(target.target_type);

        let result = match ranking {
            Some(ranking) => {
                let sql = format!(
                    "UPDATE {} SET upvotes = $1, downvotes = $2, score = $3, \
                     hot_score = $4, controversy_score = $5 WHERE id = $6",
                    t.target
                );
                sqlx::query(&sql)
                    .bind(snapshot.upvotes)
                    .bind(snapshot.downvotes)
                    .bind(snapshot.score)
                    .bind(ranking.hot_score)
                    .bind(ranking.controversy_score)
                    .bind(target.target_id)
                    .execute(&mut *self.tx)
                    .await?
            }
            None => {
                let sql = format!(
                    "UPDATE {} SET upvotes = $1, downvotes = $2, score = $3 WHERE id = $4",
                    t.target
                );
                sqlx::query(&sql)
                    .bind(snapshot.upvotes)
                    .bind(snapshot.downvotes)
                    .bind(snapshot.score)
                    .bind(target.target_id)
                    .execute(&mut *self.tx)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(VoteStoreError::TargetNotFound(target));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), VoteStoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), VoteStoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
