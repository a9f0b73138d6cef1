//! Error types for the Agora votes server.
//! Covers configuration loading, startup wiring and the mapping of vote
//! service failures onto HTTP responses.
use agora_votes_service::VoteServiceError;
use agora_votes_shared::types::TargetType;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Repository error: {0}")]
    Repository(#[from] agora_votes_repository::VoteStoreError),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tracing error: {0}")]
    Tracing(String),
}

/// Failure of an HTTP request, rendered as `{ "message": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Vote(#[from] VoteServiceError),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Vote(e) if e.is_validation() => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Vote(VoteServiceError::TargetNotFound(target)) => {
                let message = match target.target_type {
                    TargetType::Discussion => "Discussion not found",
                    TargetType::Reply => "Reply not found",
                };
                (StatusCode::NOT_FOUND, message.to_string())
            }
            ApiError::Vote(VoteServiceError::VoteNotFound(_)) => {
                (StatusCode::NOT_FOUND, "Vote not found".to_string())
            }
            ApiError::Vote(VoteServiceError::Timeout(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Vote could not be processed in time".to_string(),
            ),
            ApiError::Vote(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(error = %self, "Vote request failed");
        }

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}
