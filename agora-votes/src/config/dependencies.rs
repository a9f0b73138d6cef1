use std::sync::Arc;
use std::time::Duration;

use agora_votes_repository::{PostgresVoteRepository, VoteRepository};
use agora_votes_service::{RoomRegistry, VoteService, VoteServiceConfig};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::AppConfig;
use crate::errors::StartupError;

const TABLES_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// `Dependencies` holds the components the HTTP server is built from.
///
/// The vote service publishes committed score changes into `rooms`, which the
/// event stream handlers subscribe to.
pub struct Dependencies {
    pub repository: Arc<dyn VoteRepository>,
    pub rooms: RoomRegistry,
    pub service: Arc<VoteService>,
}

impl Dependencies {
    /// Connects to PostgreSQL, applies migrations and wires the vote service.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration loaded from the environment
    ///
    /// # Returns
    ///
    /// A `Result` which is `Ok(Self)` on successful initialization or a
    /// `StartupError` if the database cannot be reached or migrated.
    pub async fn new(config: &AppConfig) -> Result<Self, StartupError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(config.database_acquire_timeout)
            .connect(&config.database_url)
            .await?;

        let repository = PostgresVoteRepository::new(pool).await?;
        repository.run_migrations().await?;

        // Wait until the tables are created
        loop {
            if repository.check_tables_created().await? {
                break;
            }
            info!("Waiting for vote tables to be created...");
            tokio::time::sleep(TABLES_POLL_INTERVAL).await;
        }

        Ok(Self::from_repository(Arc::new(repository), config))
    }

    /// Wires the vote service and room registry around an existing store.
    pub fn from_repository(repository: Arc<dyn VoteRepository>, config: &AppConfig) -> Self {
        let rooms = RoomRegistry::new(config.room_channel_capacity);
        let service_config = VoteServiceConfig {
            cast_timeout: config.cast_timeout,
        };
        let service = Arc::new(VoteService::with_config(
            repository.clone(),
            Arc::new(rooms.clone()),
            service_config,
        ));

        Self {
            repository,
            rooms,
            service,
        }
    }
}
