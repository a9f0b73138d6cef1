//! # Agora Votes Repository
//! This crate provides the storage side of the voting subsystem: the
//! `VoteRepository` / `VoteTransaction` interfaces over vote rows and target
//! score snapshots, their error type, a PostgreSQL implementation and an
//! in-memory implementation with the same locking semantics.
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod postgres;

pub use errors::VoteStoreError;
pub use interfaces::{VoteRepository, VoteTransaction};
pub use memory::InMemoryVoteRepository;
pub use postgres::PostgresVoteRepository;
