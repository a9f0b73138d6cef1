// Server module - HTTP server setup and routing
pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use self::state::AppState;

/// Create the Axum application router with all routes and middleware
pub fn create_app(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/discussions/:id/vote", post(handlers::cast_discussion_vote))
        .route(
            "/discussions/:id/vote/:user_id",
            get(handlers::get_discussion_vote),
        )
        .route("/discussions/:id/score", get(handlers::get_discussion_score))
        .route("/discussions/:id/events", get(handlers::discussion_events))
        .route("/replies/:id/vote", post(handlers::cast_reply_vote))
        .route("/replies/:id/vote/:user_id", get(handlers::get_reply_vote))
        .route("/replies/:id/score", get(handlers::get_reply_score))
        .route("/users/:user_id/votes", delete(handlers::purge_user_votes))
        .layer(create_cors_layer(allowed_origins))
        .with_state(state)
}

/// Create CORS layer restricted to the configured origins
pub fn create_cors_layer(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60))
}

/// Run the server on the specified address until a shutdown signal arrives
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), StartupError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);
    info!("- Vote endpoint: http://{}/discussions/:id/vote", addr);
    info!("- Events endpoint: http://{}/discussions/:id/events", addr);
    info!("- Health endpoint: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
