//! Read side of the ledger
//!
//! `latest` and `status` always read the chain itself. Listings filter on the
//! cached projection in `assets`, which every write path keeps current in the
//! same transaction (see [`super::write`]).

use super::chain::SupersessionChain;
use super::status::TranscriptionStatus;
use crate::db::models::{AssetSummary, Transcription, TRANSCRIPTION_COLUMNS};
use crate::pagination::{calculate_pagination, Page, PageInfo, PageRequest};
use crate::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};

/// Latest revision of an asset, or `None` if it was never transcribed
pub async fn latest(pool: &SqlitePool, asset_id: i64) -> Result<Option<Transcription>> {
    let mut conn = pool.acquire().await?;
    ensure_asset_exists(&mut conn, asset_id).await?;
    latest_on(&mut conn, asset_id).await
}

/// Status derived from the latest revision
pub async fn status(pool: &SqlitePool, asset_id: i64) -> Result<TranscriptionStatus> {
    let latest = latest(pool, asset_id).await?;
    Ok(TranscriptionStatus::derive(latest.as_ref()))
}

pub async fn get_transcription(pool: &SqlitePool, transcription_id: i64) -> Result<Transcription> {
    let mut conn = pool.acquire().await?;
    transcription_on(&mut conn, transcription_id).await
}

/// Every revision of an asset, newest first, walked through `supersedes_id`
pub async fn history(pool: &SqlitePool, asset_id: i64) -> Result<Vec<Transcription>> {
    let mut conn = pool.acquire().await?;
    let chain = chain_on(&mut conn, asset_id).await?;
    Ok(chain.walk()?.into_iter().cloned().collect())
}

/// Assets whose status is in `statuses` (empty = every asset), ordered by id
pub async fn list_by_status(
    pool: &SqlitePool,
    statuses: &[TranscriptionStatus],
    request: PageRequest,
    max_page_size: i64,
) -> Result<Page<AssetSummary>> {
    let request = request.clamped(max_page_size);

    let filter = if statuses.is_empty() {
        String::new()
    } else {
        let placeholders = vec!["?"; statuses.len()].join(", ");
        format!("WHERE a.transcription_status IN ({})", placeholders)
    };

    // Count and page from one read snapshot
    let mut tx = pool.begin().await?;

    let count_sql = format!("SELECT COUNT(*) FROM assets a {}", filter);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for status in statuses {
        count_query = count_query.bind(status.as_str());
    }
    let total_count = count_query.fetch_one(&mut *tx).await?;

    let p = calculate_pagination(total_count, request.page, request.per_page);

    let page_sql = format!(
        r#"
        SELECT a.id, a.item_id, a.title, a.slug, a.sequence, a.transcription_status,
               t.id AS t_id, t.text AS t_text, t.user_id AS t_user_id
        FROM assets a
        LEFT JOIN transcriptions t ON t.id = a.latest_transcription_id
        {}
        ORDER BY a.id
        LIMIT ? OFFSET ?
        "#,
        filter
    );
    let mut page_query = sqlx::query(&page_sql);
    for status in statuses {
        page_query = page_query.bind(status.as_str());
    }
    let rows = page_query
        .bind(p.per_page)
        .bind(p.offset)
        .fetch_all(&mut *tx)
        .await?;

    tx.commit().await?;

    let objects = rows
        .iter()
        .map(AssetSummary::from_row)
        .collect::<Result<Vec<_>>>()?;

    Ok(Page {
        objects,
        pagination: PageInfo::from(p),
    })
}

/// Transcriptions authored by a user, newest first
pub async fn transcriptions_by_user(
    pool: &SqlitePool,
    user_id: i64,
    request: PageRequest,
    max_page_size: i64,
) -> Result<Page<Transcription>> {
    let request = request.clamped(max_page_size);
    let mut tx = pool.begin().await?;

    let user_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if user_exists.is_none() {
        return Err(Error::NotFound(format!("User {}", user_id)));
    }

    let total_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transcriptions WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    let p = calculate_pagination(total_count, request.page, request.per_page);

    let sql = format!(
        "SELECT {} FROM transcriptions WHERE user_id = ? ORDER BY id DESC LIMIT ? OFFSET ?",
        TRANSCRIPTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(p.per_page)
        .bind(p.offset)
        .fetch_all(&mut *tx)
        .await?;

    tx.commit().await?;

    let objects = rows
        .iter()
        .map(Transcription::from_row)
        .collect::<Result<Vec<_>>>()?;

    Ok(Page {
        objects,
        pagination: PageInfo::from(p),
    })
}

pub(crate) async fn ensure_asset_exists(conn: &mut SqliteConnection, asset_id: i64) -> Result<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM assets WHERE id = ?")
        .bind(asset_id)
        .fetch_optional(&mut *conn)
        .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(Error::NotFound(format!("Asset {}", asset_id))),
    }
}

pub(crate) async fn ensure_user_exists(conn: &mut SqliteConnection, user_id: i64) -> Result<bool> {
    let is_anonymous: Option<i64> = sqlx::query_scalar("SELECT is_anonymous FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    is_anonymous
        .map(|flag| flag != 0)
        .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))
}

/// Highest revision of the asset; recency never depends on ids or clocks
pub(crate) async fn latest_on(conn: &mut SqliteConnection, asset_id: i64) -> Result<Option<Transcription>> {
    let sql = format!(
        "SELECT {} FROM transcriptions WHERE asset_id = ? ORDER BY revision DESC LIMIT 1",
        TRANSCRIPTION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(asset_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(Transcription::from_row).transpose()
}

pub(crate) async fn transcription_on(
    conn: &mut SqliteConnection,
    transcription_id: i64,
) -> Result<Transcription> {
    let sql = format!("SELECT {} FROM transcriptions WHERE id = ?", TRANSCRIPTION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(transcription_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Transcription {}", transcription_id)))?;

    Transcription::from_row(&row)
}

pub(crate) async fn chain_on(conn: &mut SqliteConnection, asset_id: i64) -> Result<SupersessionChain> {
    ensure_asset_exists(conn, asset_id).await?;

    let sql = format!(
        "SELECT {} FROM transcriptions WHERE asset_id = ? ORDER BY revision",
        TRANSCRIPTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(asset_id)
        .fetch_all(&mut *conn)
        .await?;

    let revisions = rows
        .iter()
        .map(Transcription::from_row)
        .collect::<Result<Vec<_>>>()?;

    SupersessionChain::new(asset_id, revisions)
}
