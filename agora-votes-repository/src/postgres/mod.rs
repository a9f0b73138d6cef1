//! PostgreSQL implementation of the votes repository.
//!
//! Provides the production backend for the `VoteRepository` trait with
//! connection pooling, transaction safety and structural uniqueness of votes.
//!
//! ## Key Features
//!
//! - Connection pooling with `sqlx::PgPool`
//! - One `sqlx::Transaction` per `VoteTransaction`, rolled back on drop
//! - Natural-key primary keys; unique violations surface as `DuplicateVote`
//! - `SELECT ... FOR UPDATE` on the target row before recounting its votes
//! - Embedded migrations under `src/postgres/migrations`
//!
//! ## Database Tables
//!
//! - `discussions`, `replies`: targets carrying the score snapshot columns
//! - `discussion_votes`, `reply_votes`: one row per (target, user)
mod votes_repository;

pub use votes_repository::{PostgresVoteRepository, PostgresVoteTransaction};
