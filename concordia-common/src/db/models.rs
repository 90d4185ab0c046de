//! Database models

use crate::ledger::TranscriptionStatus;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_anonymous: bool,
}

impl User {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            is_anonymous: row.try_get::<i64, _>("is_anonymous")? != 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub campaign_id: i64,
    pub title: String,
    pub slug: String,
}

/// A grouping of assets (typically one physical document)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub project_id: i64,
    /// Catalogue identifier of the document
    pub item_id: String,
    pub title: String,
    pub slug: Option<String>,
}

/// A single transcribable unit (typically one page image)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub item_id: i64,
    pub title: String,
    pub slug: String,
    pub sequence: i64,
    /// Cached projection of the transcription chain
    pub transcription_status: TranscriptionStatus,
    pub latest_transcription_id: Option<i64>,
}

impl Asset {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: String = row.try_get("transcription_status")?;
        Ok(Self {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            sequence: row.try_get("sequence")?,
            transcription_status: status.parse()?,
            latest_transcription_id: row.try_get("latest_transcription_id")?,
        })
    }
}

/// One immutable revision of an asset's text
///
/// Only `submitted_at` and the review columns are ever written after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub id: i64,
    pub asset_id: i64,
    /// Author
    pub user_id: i64,
    /// Position in the asset's chain, starting at 1
    pub revision: i64,
    pub supersedes_id: Option<i64>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<i64>,
}

/// Column list matching [`Transcription::from_row`]
pub(crate) const TRANSCRIPTION_COLUMNS: &str = "id, asset_id, user_id, revision, supersedes_id, text, \
     created_at, submitted_at, accepted_at, rejected_at, reviewed_by";

impl Transcription {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            asset_id: row.try_get("asset_id")?,
            user_id: row.try_get("user_id")?,
            revision: row.try_get("revision")?,
            supersedes_id: row.try_get("supersedes_id")?,
            text: row.try_get("text")?,
            created_at: row.try_get("created_at")?,
            submitted_at: row.try_get("submitted_at")?,
            accepted_at: row.try_get("accepted_at")?,
            rejected_at: row.try_get("rejected_at")?,
            reviewed_by: row.try_get("reviewed_by")?,
        })
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub fn is_reviewed(&self) -> bool {
        self.accepted_at.is_some() || self.rejected_at.is_some()
    }
}

/// The fields of an asset's latest transcription exposed by listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestTranscription {
    pub id: i64,
    pub text: String,
    pub submitted_by: i64,
}

/// Asset row as returned by status listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub id: i64,
    pub item_id: i64,
    pub title: String,
    pub slug: String,
    pub sequence: i64,
    pub transcription_status: TranscriptionStatus,
    pub latest_transcription: Option<LatestTranscription>,
}

impl AssetSummary {
    /// Decode a row of `assets` LEFT JOINed with its latest transcription
    /// (columns `t_id`, `t_text`, `t_user_id`)
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: String = row.try_get("transcription_status")?;
        let latest_id: Option<i64> = row.try_get("t_id")?;

        let latest_transcription = match latest_id {
            Some(id) => Some(LatestTranscription {
                id,
                text: row.try_get("t_text")?,
                submitted_by: row.try_get("t_user_id")?,
            }),
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            sequence: row.try_get("sequence")?,
            transcription_status: status.parse()?,
            latest_transcription,
        })
    }
}
