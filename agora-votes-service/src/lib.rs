//! # Agora Votes Service
//! This crate holds the application side of the voting subsystem.
//! It includes the score aggregator, the vote service state machine that casts
//! votes atomically against a `VoteRepository`, and the real-time notifier
//! with its discussion room registry, along with error handling.
pub mod aggregator;
pub mod config;
pub mod notifier;
pub mod service;

pub mod errors;

pub use aggregator::{RecomputedScore, ScoreAggregator};
pub use config::VoteServiceConfig;
pub use errors::{AggregatorError, VoteServiceError};
pub use notifier::{NoopNotifier, RoomRegistry, RoomSubscription, ScoreNotifier};
pub use service::VoteService;
