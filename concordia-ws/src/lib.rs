//! concordia-ws library - JSON web services over the transcription ledger
//!
//! Read endpoints list assets by transcription status and expose latest and
//! historical revisions. Write endpoints append, submit and review revisions.

use axum::routing::get;
use axum::Router;
use concordia_common::config::ListingConfig;
use concordia_common::Ledger;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    /// Page size defaults and cap for listing endpoints
    pub listing: ListingConfig,
}

impl AppState {
    pub fn new(ledger: Ledger, listing: ListingConfig) -> Self {
        Self { ledger, listing }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::asset_routes())
        .merge(api::transcription_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
