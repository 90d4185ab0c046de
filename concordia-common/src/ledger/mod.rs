//! Transcription ledger
//!
//! Each asset owns an append-only chain of transcription revisions linked by
//! `supersedes_id` and ordered by the per-asset `revision` sequence. The
//! latest revision determines the asset's [`TranscriptionStatus`]; the copy
//! of that status cached on `assets` is rewritten in the same transaction as
//! every ledger write.

pub mod chain;
pub mod query;
pub mod status;
pub mod write;

pub use chain::SupersessionChain;
pub use status::TranscriptionStatus;
pub use write::ReviewAction;

use crate::config::{DatabaseConfig, ListingConfig};
use crate::db::models::{AssetSummary, Transcription};
use crate::db::retry_on_lock;
use crate::pagination::{Page, PageRequest};
use crate::Result;
use sqlx::SqlitePool;

/// Handle over the ledger tables
///
/// Reads go straight to [`query`]; writes go through [`write`] wrapped in
/// bounded lock-contention retry. Cheap to clone.
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
    max_page_size: i64,
}

impl Ledger {
    pub fn new(pool: SqlitePool, database: &DatabaseConfig, listing: &ListingConfig) -> Self {
        Self {
            pool,
            max_lock_wait_ms: database.max_lock_wait_ms,
            max_page_size: listing.max_page_size,
        }
    }

    /// Ledger with default retry window and page cap
    pub fn with_defaults(pool: SqlitePool) -> Self {
        Self::new(pool, &DatabaseConfig::default(), &ListingConfig::default())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn max_page_size(&self) -> i64 {
        self.max_page_size
    }

    pub async fn latest(&self, asset_id: i64) -> Result<Option<Transcription>> {
        query::latest(&self.pool, asset_id).await
    }

    pub async fn status(&self, asset_id: i64) -> Result<TranscriptionStatus> {
        query::status(&self.pool, asset_id).await
    }

    pub async fn get_transcription(&self, transcription_id: i64) -> Result<Transcription> {
        query::get_transcription(&self.pool, transcription_id).await
    }

    pub async fn history(&self, asset_id: i64) -> Result<Vec<Transcription>> {
        query::history(&self.pool, asset_id).await
    }

    pub async fn list_by_status(
        &self,
        statuses: &[TranscriptionStatus],
        request: PageRequest,
    ) -> Result<Page<AssetSummary>> {
        query::list_by_status(&self.pool, statuses, request, self.max_page_size).await
    }

    pub async fn transcriptions_by_user(
        &self,
        user_id: i64,
        request: PageRequest,
    ) -> Result<Page<Transcription>> {
        query::transcriptions_by_user(&self.pool, user_id, request, self.max_page_size).await
    }

    pub async fn append_transcription(
        &self,
        asset_id: i64,
        author_id: i64,
        text: &str,
        supersedes: Option<i64>,
    ) -> Result<Transcription> {
        let pool = &self.pool;
        retry_on_lock("append transcription", self.max_lock_wait_ms, move || {
            write::append_transcription(pool, asset_id, author_id, text, supersedes, false)
        })
        .await
    }

    /// Append a revision and submit it for review in one transaction
    pub async fn append_submitted_transcription(
        &self,
        asset_id: i64,
        author_id: i64,
        text: &str,
        supersedes: Option<i64>,
    ) -> Result<Transcription> {
        let pool = &self.pool;
        retry_on_lock("append submitted transcription", self.max_lock_wait_ms, move || {
            write::append_transcription(pool, asset_id, author_id, text, supersedes, true)
        })
        .await
    }

    pub async fn submit_transcription(&self, transcription_id: i64) -> Result<Transcription> {
        let pool = &self.pool;
        retry_on_lock("submit transcription", self.max_lock_wait_ms, move || {
            write::submit_transcription(pool, transcription_id)
        })
        .await
    }

    pub async fn review_transcription(
        &self,
        transcription_id: i64,
        reviewer_id: i64,
        action: ReviewAction,
    ) -> Result<Transcription> {
        let pool = &self.pool;
        retry_on_lock("review transcription", self.max_lock_wait_ms, move || {
            write::review_transcription(pool, transcription_id, reviewer_id, action)
        })
        .await
    }

    pub async fn rebuild_status_cache(&self) -> Result<u64> {
        let pool = &self.pool;
        retry_on_lock("rebuild status cache", self.max_lock_wait_ms, move || {
            write::rebuild_status_cache(pool)
        })
        .await
    }
}
