//! Asset listings filtered by transcription status
//!
//! All three listings share one response shape: `{"objects": [...],
//! "pagination": {...}}`, ordered by asset id, with `per_page` clamped to the
//! configured maximum.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use concordia_common::config::ListingConfig;
use concordia_common::db::AssetSummary;
use concordia_common::{Page, PageRequest, TranscriptionStatus};
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiResult;
use crate::AppState;

/// Query parameters accepted by every listing
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Page number (1-indexed)
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ListQuery {
    pub fn page_request(&self, listing: &ListingConfig) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(listing.default_page_size),
        )
    }
}

/// GET /api/v1/assets/
pub async fn list_assets(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<AssetSummary>>> {
    list_with_statuses(&state, &[], query).await
}

/// GET /api/v1/assets/transcribe/
pub async fn list_transcribable_assets(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<AssetSummary>>> {
    list_with_statuses(&state, &TranscriptionStatus::TRANSCRIBABLE, query).await
}

/// GET /api/v1/assets/review/
pub async fn list_reviewable_assets(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<AssetSummary>>> {
    list_with_statuses(&state, &TranscriptionStatus::REVIEWABLE, query).await
}

async fn list_with_statuses(
    state: &AppState,
    statuses: &[TranscriptionStatus],
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<AssetSummary>>> {
    let Query(query) = query?;
    let request = query.page_request(&state.listing);

    let page = state.ledger.list_by_status(statuses, request).await?;

    debug!(
        ?statuses,
        page = page.pagination.page,
        returned = page.objects.len(),
        total = page.pagination.total_count,
        "Listed assets"
    );

    Ok(Json(page))
}

/// Build asset listing routes
pub fn asset_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/assets/", get(list_assets))
        .route("/api/v1/assets/transcribe/", get(list_transcribable_assets))
        .route("/api/v1/assets/review/", get(list_reviewable_assets))
}
