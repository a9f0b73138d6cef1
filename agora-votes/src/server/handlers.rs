// HTTP request handlers
use std::convert::Infallible;

use agora_votes_service::VoteServiceError;
use agora_votes_shared::types::{
    CastVoteOutcome, ScoreChangeEvent, ScoreSnapshot, TargetId, TargetRef, TargetType, VoteAction,
    VoteType,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::errors::ApiError;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub vote_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CastVoteResponse {
    pub message: String,
    pub vote: Option<VoteType>,
    pub score: i64,
    pub upvotes: i64,
    pub downvotes: i64,
}

impl From<CastVoteOutcome> for CastVoteResponse {
    fn from(outcome: CastVoteOutcome) -> Self {
        let message = match outcome.action {
            VoteAction::Recorded => "Vote recorded",
            VoteAction::Updated => "Vote updated",
            VoteAction::Removed => "Vote removed",
        };
        Self {
            message: message.to_string(),
            vote: outcome.vote,
            score: outcome.snapshot.score,
            upvotes: outcome.snapshot.upvotes,
            downvotes: outcome.snapshot.downvotes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteResponse {
    pub vote: Option<VoteType>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub target_id: TargetId,
    pub target_type: TargetType,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

impl ScoreResponse {
    fn new(target: TargetRef, snapshot: ScoreSnapshot) -> Self {
        Self {
            target_id: target.target_id,
            target_type: target.target_type,
            upvotes: snapshot.upvotes,
            downvotes: snapshot.downvotes,
            score: snapshot.score,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AffectedTarget {
    pub target_id: TargetId,
    pub target_type: TargetType,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub message: String,
    pub affected_targets: Vec<AffectedTarget>,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn cast(
    state: AppState,
    target: TargetRef,
    payload: Result<Json<CastVoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CastVoteResponse>), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let user_id = request.user_id.unwrap_or_default();
    let vote_type = request
        .vote_type
        .unwrap_or_default()
        .parse::<VoteType>()
        .map_err(VoteServiceError::from)?;

    let outcome = state.service.cast_vote(target, &user_id, vote_type).await?;
    let status = match outcome.action {
        VoteAction::Recorded => StatusCode::CREATED,
        VoteAction::Updated | VoteAction::Removed => StatusCode::OK,
    };

    Ok((status, Json(outcome.into())))
}

/// Cast, change or toggle off a vote on a discussion
pub async fn cast_discussion_vote(
    State(state): State<AppState>,
    Path(id): Path<TargetId>,
    payload: Result<Json<CastVoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CastVoteResponse>), ApiError> {
    cast(state, TargetRef::discussion(id), payload).await
}

/// Cast, change or toggle off a vote on a reply
pub async fn cast_reply_vote(
    State(state): State<AppState>,
    Path(id): Path<TargetId>,
    payload: Result<Json<CastVoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CastVoteResponse>), ApiError> {
    cast(state, TargetRef::reply(id), payload).await
}

pub async fn get_discussion_vote(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(TargetId, String)>,
) -> Result<Json<VoteResponse>, ApiError> {
    let vote = state
        .service
        .current_vote(TargetRef::discussion(id), &user_id)
        .await?;
    Ok(Json(VoteResponse { vote }))
}

pub async fn get_reply_vote(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(TargetId, String)>,
) -> Result<Json<VoteResponse>, ApiError> {
    let vote = state
        .service
        .current_vote(TargetRef::reply(id), &user_id)
        .await?;
    Ok(Json(VoteResponse { vote }))
}

pub async fn get_discussion_score(
    State(state): State<AppState>,
    Path(id): Path<TargetId>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let target = TargetRef::discussion(id);
    let snapshot = state.service.current_score(target).await?;
    Ok(Json(ScoreResponse::new(target, snapshot)))
}

pub async fn get_reply_score(
    State(state): State<AppState>,
    Path(id): Path<TargetId>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let target = TargetRef::reply(id);
    let snapshot = state.service.current_score(target).await?;
    Ok(Json(ScoreResponse::new(target, snapshot)))
}

/// Server-sent `vote_update` events for everyone viewing a discussion.
///
/// The connection is the room membership: it is joined here and left when the
/// client disconnects and the stream is dropped.
pub async fn discussion_events(
    State(state): State<AppState>,
    Path(id): Path<TargetId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    state.service.current_score(TargetRef::discussion(id)).await?;

    let subscription = state.rooms.join(id);
    info!(discussion_id = id, "Client subscribed to discussion events");

    let stream = subscription.into_stream().filter_map(|event| to_sse_event(&event));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &ScoreChangeEvent) -> Option<Result<Event, Infallible>> {
    match Event::default().event("vote_update").json_data(event) {
        Ok(event) => Some(Ok(event)),
        Err(e) => {
            warn!(error = %e, "Failed to encode score change event");
            None
        }
    }
}

/// Remove every vote of a user, e.g. when the account is deleted
pub async fn purge_user_votes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let targets = state.service.purge_user_votes(&user_id).await?;

    Ok(Json(PurgeResponse {
        message: "User votes removed".to_string(),
        affected_targets: targets
            .into_iter()
            .map(|target| AffectedTarget {
                target_id: target.target_id,
                target_type: target.target_type,
            })
            .collect(),
    }))
}
