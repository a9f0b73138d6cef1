//! Agora Votes Main Entry Point
//!
//! Serves the vote, score and discussion event endpoints on top of PostgreSQL.

use agora_votes::server::{create_app, run_server, state::AppState};
use agora_votes::{AppConfig, Dependencies, LogFormat, StartupError};
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging.
fn init_tracing(format: LogFormat) -> Result<(), StartupError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("agora_votes=info,agora_votes_service=info,agora_votes_repository=info")
    });

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init(),
    }
    .map_err(|e| StartupError::Tracing(e.to_string()))?;

    info!(
        service_name = "agora-votes",
        service_version = env!("CARGO_PKG_VERSION"),
        log_format = ?format,
        "Tracing initialized"
    );
    Ok(())
}

/// Main entry point for the Agora votes server.
///
/// Loads the environment, sets up tracing and dependencies, and serves HTTP
/// until a shutdown signal arrives.
#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_format)?;

    info!("Starting Agora votes server");

    let dependencies = match Dependencies::new(&config).await {
        Ok(dependencies) => {
            info!("Dependencies initialized successfully");
            dependencies
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let app = create_app(
        AppState::from(&dependencies),
        config.cors_allowed_origins.clone(),
    );

    if let Err(e) = run_server(app, config.socket_addr()).await {
        error!(error = %e, "Server error");
        return Err(e);
    }
    Ok(())
}
