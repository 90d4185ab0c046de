//! Transcription lookups and ledger commands
//!
//! Authentication is out of scope: the acting user is named by `user_id` in
//! the request body, and appends without one are attributed to the anonymous
//! user.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use concordia_common::db::{catalog, Transcription};
use concordia_common::{Page, ReviewAction, TranscriptionStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::assets::ListQuery;
use crate::error::ApiResult;
use crate::AppState;

/// Body of POST /ws/assets/:asset_id/transcriptions/
#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    pub text: String,
    /// Revision the client edited; omitted means "whatever is latest"
    #[serde(default)]
    pub supersedes: Option<i64>,
    /// Author; omitted means the anonymous user
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Store the new revision already submitted for review
    #[serde(default)]
    pub submit: bool,
}

/// Body of POST /ws/transcriptions/:id/review/
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub action: ReviewAction,
    pub user_id: i64,
}

/// Full revision chain of one asset
#[derive(Debug, Serialize)]
pub struct TranscriptionHistory {
    pub asset_id: i64,
    pub transcription_status: TranscriptionStatus,
    /// Newest first
    pub transcriptions: Vec<Transcription>,
}

/// GET /ws/transcription/:asset_id/
///
/// Latest revision of the asset, `null` if it has never been transcribed.
pub async fn get_latest_transcription(
    State(state): State<AppState>,
    asset_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Option<Transcription>>> {
    let Path(asset_id) = asset_id?;
    Ok(Json(state.ledger.latest(asset_id).await?))
}

/// GET /ws/transcription_by_asset/:asset_id/
pub async fn transcriptions_by_asset(
    State(state): State<AppState>,
    asset_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<TranscriptionHistory>> {
    let Path(asset_id) = asset_id?;
    let transcriptions = state.ledger.history(asset_id).await?;
    let transcription_status = TranscriptionStatus::derive(transcriptions.first());

    Ok(Json(TranscriptionHistory {
        asset_id,
        transcription_status,
        transcriptions,
    }))
}

/// GET /ws/transcription_by_user/:user_id/
pub async fn transcriptions_by_user(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<Transcription>>> {
    let Path(user_id) = user_id?;
    let Query(query) = query?;

    let page = state
        .ledger
        .transcriptions_by_user(user_id, query.page_request(&state.listing))
        .await?;

    Ok(Json(page))
}

/// POST /ws/assets/:asset_id/transcriptions/
pub async fn append_transcription(
    State(state): State<AppState>,
    asset_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<AppendRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Transcription>)> {
    let Path(asset_id) = asset_id?;
    let Json(request) = body?;

    let author_id = match request.user_id {
        Some(user_id) => user_id,
        None => catalog::get_anonymous_user(state.ledger.pool()).await?.id,
    };

    let transcription = if request.submit {
        state
            .ledger
            .append_submitted_transcription(asset_id, author_id, &request.text, request.supersedes)
            .await?
    } else {
        state
            .ledger
            .append_transcription(asset_id, author_id, &request.text, request.supersedes)
            .await?
    };

    info!(
        asset_id,
        transcription_id = transcription.id,
        submitted = transcription.is_submitted(),
        "Saved transcription"
    );

    Ok((StatusCode::CREATED, Json(transcription)))
}

/// POST /ws/transcriptions/:id/submit/
pub async fn submit_transcription(
    State(state): State<AppState>,
    transcription_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Transcription>> {
    let Path(transcription_id) = transcription_id?;
    Ok(Json(state.ledger.submit_transcription(transcription_id).await?))
}

/// POST /ws/transcriptions/:id/review/
pub async fn review_transcription(
    State(state): State<AppState>,
    transcription_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> ApiResult<Json<Transcription>> {
    let Path(transcription_id) = transcription_id?;
    let Json(request) = body?;

    let transcription = state
        .ledger
        .review_transcription(transcription_id, request.user_id, request.action)
        .await?;

    Ok(Json(transcription))
}

/// Build transcription routes
pub fn transcription_routes() -> Router<AppState> {
    Router::new()
        .route("/ws/transcription/:asset_id/", get(get_latest_transcription))
        .route("/ws/transcription_by_asset/:asset_id/", get(transcriptions_by_asset))
        .route("/ws/transcription_by_user/:user_id/", get(transcriptions_by_user))
        .route("/ws/assets/:asset_id/transcriptions/", post(append_transcription))
        .route("/ws/transcriptions/:id/submit/", post(submit_transcription))
        .route("/ws/transcriptions/:id/review/", post(review_transcription))
}
