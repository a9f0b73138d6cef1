mod aggregator;
mod vote_service;

pub use aggregator::AggregatorError;
pub use vote_service::VoteServiceError;
