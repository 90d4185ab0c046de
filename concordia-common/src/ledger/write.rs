//! Write side of the ledger
//!
//! Every operation here runs inside one [`ImmediateTransaction`]: read the
//! chain, validate, write, recompute the asset's cached projection, commit.
//! Lock contention surfaces as a database error; [`super::Ledger`] wraps these
//! calls in [`retry_on_lock`](crate::db::retry_on_lock).

use super::query::{ensure_asset_exists, ensure_user_exists, latest_on, transcription_on};
use super::status::TranscriptionStatus;
use crate::db::models::Transcription;
use crate::db::ImmediateTransaction;
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

/// Reviewer decision on a submitted revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Accept,
    Reject,
}

/// Append a new revision to an asset's chain
///
/// `supersedes = None` supersedes whatever is latest when the write lock is
/// taken. An explicit `supersedes` must name the current latest revision of
/// the same asset; anything else is a stale or cross-asset write.
///
/// With `submit` the revision is stored already submitted, in the same
/// transaction, so it is never committed without the submission.
pub async fn append_transcription(
    pool: &SqlitePool,
    asset_id: i64,
    author_id: i64,
    text: &str,
    supersedes: Option<i64>,
    submit: bool,
) -> Result<Transcription> {
    let mut tx = ImmediateTransaction::begin(pool).await?;
    let outcome = append_locked(tx.conn()?, asset_id, author_id, text, supersedes, submit).await;
    let transcription = tx.finish_with(outcome).await?;

    info!(
        asset_id,
        transcription_id = transcription.id,
        revision = transcription.revision,
        author_id,
        submitted = submit,
        "Appended transcription"
    );

    Ok(transcription)
}

/// Mark the latest revision of its asset as submitted for review
pub async fn submit_transcription(pool: &SqlitePool, transcription_id: i64) -> Result<Transcription> {
    let mut tx = ImmediateTransaction::begin(pool).await?;
    let outcome = submit_locked(tx.conn()?, transcription_id).await;
    let transcription = tx.finish_with(outcome).await?;

    info!(
        asset_id = transcription.asset_id,
        transcription_id,
        "Submitted transcription for review"
    );

    Ok(transcription)
}

/// Accept or reject the latest, submitted revision of its asset
pub async fn review_transcription(
    pool: &SqlitePool,
    transcription_id: i64,
    reviewer_id: i64,
    action: ReviewAction,
) -> Result<Transcription> {
    let mut tx = ImmediateTransaction::begin(pool).await?;
    let outcome = review_locked(tx.conn()?, transcription_id, reviewer_id, action).await;
    let transcription = tx.finish_with(outcome).await?;

    info!(
        asset_id = transcription.asset_id,
        transcription_id,
        reviewer_id,
        ?action,
        "Reviewed transcription"
    );

    Ok(transcription)
}

/// Recompute every asset's cached projection from its chain
///
/// Needed after bulk loads that insert transcriptions directly. Returns the
/// number of assets whose cached status or latest pointer changed.
pub async fn rebuild_status_cache(pool: &SqlitePool) -> Result<u64> {
    let mut tx = ImmediateTransaction::begin(pool).await?;
    let outcome = rebuild_locked(tx.conn()?).await;
    let changed = tx.finish_with(outcome).await?;

    if changed > 0 {
        warn!(changed, "Repaired stale transcription status projections");
    } else {
        info!("Transcription status projections already consistent");
    }

    Ok(changed)
}

async fn append_locked(
    conn: &mut SqliteConnection,
    asset_id: i64,
    author_id: i64,
    text: &str,
    supersedes: Option<i64>,
    submit: bool,
) -> Result<Transcription> {
    ensure_asset_exists(conn, asset_id).await?;
    ensure_user_exists(conn, author_id).await?;

    let current = latest_on(conn, asset_id).await?;

    if let Some(supersedes_id) = supersedes {
        let previous = transcription_on(conn, supersedes_id).await?;
        if previous.asset_id != asset_id {
            return Err(Error::Validation(format!(
                "Transcription {} belongs to asset {}, not asset {}",
                supersedes_id, previous.asset_id, asset_id
            )));
        }
        if current.as_ref().map(|t| t.id) != Some(supersedes_id) {
            return Err(Error::Validation(format!(
                "Transcription {} has already been superseded",
                supersedes_id
            )));
        }
    }

    let supersedes_id = current.as_ref().map(|t| t.id);
    let revision = current.as_ref().map_or(1, |t| t.revision + 1);
    let created_at = Utc::now();
    let submitted_at = submit.then_some(created_at);

    let id = sqlx::query(
        r#"
        INSERT INTO transcriptions (asset_id, user_id, revision, supersedes_id, text, created_at, submitted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(asset_id)
    .bind(author_id)
    .bind(revision)
    .bind(supersedes_id)
    .bind(text)
    .bind(created_at)
    .bind(submitted_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    refresh_projection(conn, asset_id).await?;
    transcription_on(conn, id).await
}

async fn submit_locked(conn: &mut SqliteConnection, transcription_id: i64) -> Result<Transcription> {
    let transcription = transcription_on(conn, transcription_id).await?;
    ensure_latest(conn, &transcription).await?;

    if transcription.is_submitted() {
        return Err(Error::Validation(format!(
            "Transcription {} has already been submitted",
            transcription_id
        )));
    }

    sqlx::query("UPDATE transcriptions SET submitted_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(transcription_id)
        .execute(&mut *conn)
        .await?;

    refresh_projection(conn, transcription.asset_id).await?;
    transcription_on(conn, transcription_id).await
}

async fn review_locked(
    conn: &mut SqliteConnection,
    transcription_id: i64,
    reviewer_id: i64,
    action: ReviewAction,
) -> Result<Transcription> {
    let transcription = transcription_on(conn, transcription_id).await?;
    let reviewer_is_anonymous = ensure_user_exists(conn, reviewer_id).await?;
    ensure_latest(conn, &transcription).await?;

    if reviewer_is_anonymous {
        return Err(Error::Validation(
            "Anonymous users cannot review transcriptions".to_string(),
        ));
    }
    if !transcription.is_submitted() {
        return Err(Error::Validation(format!(
            "Transcription {} has not been submitted for review",
            transcription_id
        )));
    }
    if transcription.is_reviewed() {
        return Err(Error::Validation(format!(
            "Transcription {} has already been reviewed",
            transcription_id
        )));
    }
    if transcription.user_id == reviewer_id {
        return Err(Error::Validation(
            "Users cannot review their own transcriptions".to_string(),
        ));
    }

    let column = match action {
        ReviewAction::Accept => "accepted_at",
        ReviewAction::Reject => "rejected_at",
    };
    let sql = format!(
        "UPDATE transcriptions SET {} = ?, reviewed_by = ? WHERE id = ?",
        column
    );
    sqlx::query(&sql)
        .bind(Utc::now())
        .bind(reviewer_id)
        .bind(transcription_id)
        .execute(&mut *conn)
        .await?;

    refresh_projection(conn, transcription.asset_id).await?;
    transcription_on(conn, transcription_id).await
}

async fn rebuild_locked(conn: &mut SqliteConnection) -> Result<u64> {
    let assets: Vec<(i64, String, Option<i64>)> = sqlx::query_as(
        "SELECT id, transcription_status, latest_transcription_id FROM assets ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut changed = 0u64;
    for (asset_id, cached_status, cached_latest) in assets {
        let latest = latest_on(conn, asset_id).await?;
        let status = TranscriptionStatus::derive(latest.as_ref());
        let latest_id = latest.as_ref().map(|t| t.id);

        if cached_status != status.as_str() || cached_latest != latest_id {
            debug!(
                asset_id,
                cached = %cached_status,
                actual = %status,
                "Stale status projection"
            );
            write_projection(conn, asset_id, status, latest_id).await?;
            changed += 1;
        }
    }

    Ok(changed)
}

/// Reject writes against anything but the asset's current latest revision
async fn ensure_latest(conn: &mut SqliteConnection, transcription: &Transcription) -> Result<()> {
    let latest = latest_on(conn, transcription.asset_id).await?;
    match latest {
        Some(latest) if latest.id == transcription.id => Ok(()),
        Some(latest) => Err(Error::Validation(format!(
            "Transcription {} is not the latest revision of asset {} (latest is {})",
            transcription.id, transcription.asset_id, latest.id
        ))),
        None => Err(Error::Internal(format!(
            "asset {} has no transcriptions but {} exists",
            transcription.asset_id, transcription.id
        ))),
    }
}

/// Recompute and persist the asset's cached status from its chain
async fn refresh_projection(conn: &mut SqliteConnection, asset_id: i64) -> Result<TranscriptionStatus> {
    let latest = latest_on(conn, asset_id).await?;
    let status = TranscriptionStatus::derive(latest.as_ref());
    write_projection(conn, asset_id, status, latest.map(|t| t.id)).await?;
    Ok(status)
}

async fn write_projection(
    conn: &mut SqliteConnection,
    asset_id: i64,
    status: TranscriptionStatus,
    latest_id: Option<i64>,
) -> Result<()> {
    sqlx::query("UPDATE assets SET transcription_status = ?, latest_transcription_id = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(latest_id)
        .bind(asset_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
