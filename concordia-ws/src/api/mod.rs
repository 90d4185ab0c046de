//! HTTP API handlers for concordia-ws

pub mod assets;
pub mod buildinfo;
pub mod health;
pub mod transcriptions;

pub use assets::{asset_routes, list_assets, list_reviewable_assets, list_transcribable_assets};
pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use transcriptions::{
    append_transcription, get_latest_transcription, review_transcription, submit_transcription,
    transcription_routes, transcriptions_by_asset, transcriptions_by_user,
};
