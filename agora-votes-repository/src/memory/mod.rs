//! In-memory implementation of the votes repository.
//!
//! Mirrors the PostgreSQL backend's observable behavior: a natural key is
//! locked from the first write on it until the transaction ends, `lock_target`
//! serializes recomputation per target, a losing concurrent insert fails with
//! `DuplicateVote`, and uncommitted changes are invisible to other
//! transactions. Used by the service and HTTP tests and by the benchmarks.
mod votes_repository;

pub use votes_repository::{InMemoryVoteRepository, InMemoryVoteTransaction};
