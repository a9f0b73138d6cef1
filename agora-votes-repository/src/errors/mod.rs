//! Error types for the votes repository.
//! Consolidates and re-exports error types related to vote store operations.
mod vote_store;

pub use vote_store::VoteStoreError;
