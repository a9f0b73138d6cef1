//! # Agora Votes Shared
//! This crate defines the data structures shared across the voting subsystem:
//! vote targets, user votes, tallies, score snapshots, score-change events and
//! the ranking maths applied to discussions.
pub mod ranking;
pub mod types;
