//! Configuration types for the VoteService.
use std::time::Duration;

/// Configuration for the VoteService.
#[derive(Debug, Clone)]
pub struct VoteServiceConfig {
    /// Upper bound on a single cast or purge, from opening the transaction to
    /// its commit. On expiry the transaction is dropped, which rolls it back,
    /// and no score change is published.
    ///
    /// `None` disables the bound. Defaults to 5 seconds.
    pub cast_timeout: Option<Duration>,
}

impl Default for VoteServiceConfig {
    fn default() -> Self {
        Self {
            cast_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl VoteServiceConfig {
    /// Create a config without an operation timeout.
    pub fn unbounded() -> Self {
        Self { cast_timeout: None }
    }

    /// Create a config with a custom operation timeout.
    ///
    /// # Arguments
    ///
    /// * `cast_timeout` - Maximum duration of one cast or purge transaction
    pub fn with_cast_timeout(cast_timeout: Duration) -> Self {
        Self {
            cast_timeout: Some(cast_timeout),
        }
    }
}
