//! Catalog records: users, campaigns, projects, items and assets
//!
//! These rows are created by import/admin tooling and are read-mostly
//! afterwards. Transcriptions are never written here; see [`crate::ledger`].

use super::init::ANONYMOUS_USERNAME;
use super::models::{Asset, Campaign, Item, Project, User};
use crate::{Error, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Create a registered user
pub async fn create_user(pool: &SqlitePool, username: &str) -> Result<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::Validation("username must not be empty".to_string()));
    }

    let id = sqlx::query("INSERT INTO users (username, is_anonymous, created_at) VALUES (?, 0, ?)")
        .bind(username)
        .bind(Utc::now())
        .execute(pool)
        .await?
        .last_insert_rowid();

    debug!(user_id = id, username, "Created user");

    Ok(User {
        id,
        username: username.to_string(),
        is_anonymous: false,
    })
}

pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<User> {
    let row = sqlx::query("SELECT id, username, is_anonymous FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))?;

    User::from_row(&row)
}

/// The sentinel user that owns unauthenticated contributions
pub async fn get_anonymous_user(pool: &SqlitePool) -> Result<User> {
    let row = sqlx::query("SELECT id, username, is_anonymous FROM users WHERE username = ?")
        .bind(ANONYMOUS_USERNAME)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::Internal("anonymous user missing; schema not initialized".to_string()))?;

    User::from_row(&row)
}

pub async fn create_campaign(pool: &SqlitePool, title: &str, slug: &str) -> Result<Campaign> {
    let id = sqlx::query("INSERT INTO campaigns (title, slug, created_at) VALUES (?, ?, ?)")
        .bind(title)
        .bind(slug)
        .bind(Utc::now())
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Campaign {
        id,
        title: title.to_string(),
        slug: slug.to_string(),
    })
}

pub async fn create_project(
    pool: &SqlitePool,
    campaign_id: i64,
    title: &str,
    slug: &str,
) -> Result<Project> {
    let id = sqlx::query("INSERT INTO projects (campaign_id, title, slug) VALUES (?, ?, ?)")
        .bind(campaign_id)
        .bind(title)
        .bind(slug)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Project {
        id,
        campaign_id,
        title: title.to_string(),
        slug: slug.to_string(),
    })
}

/// Create an item; `slug` is optional and unique within the project when set
pub async fn create_item(
    pool: &SqlitePool,
    project_id: i64,
    item_id: &str,
    title: &str,
    slug: Option<&str>,
) -> Result<Item> {
    let id = sqlx::query("INSERT INTO items (project_id, item_id, title, slug) VALUES (?, ?, ?, ?)")
        .bind(project_id)
        .bind(item_id)
        .bind(title)
        .bind(slug)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Item {
        id,
        project_id,
        item_id: item_id.to_string(),
        title: title.to_string(),
        slug: slug.map(str::to_string),
    })
}

/// Create an asset with no transcriptions (status `not_started`)
pub async fn create_asset(
    pool: &SqlitePool,
    item_id: i64,
    title: &str,
    slug: &str,
    sequence: i64,
) -> Result<Asset> {
    let id = sqlx::query("INSERT INTO assets (item_id, title, slug, sequence) VALUES (?, ?, ?, ?)")
        .bind(item_id)
        .bind(title)
        .bind(slug)
        .bind(sequence)
        .execute(pool)
        .await?
        .last_insert_rowid();

    get_asset(pool, id).await
}

/// Create many assets under one item in a single transaction
///
/// Sequence numbers follow slice order starting at 1; slugs are `<item row id>-<sequence>`.
pub async fn bulk_create_assets(
    pool: &SqlitePool,
    item_id: i64,
    titles: &[String],
) -> Result<Vec<i64>> {
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(titles.len());

    for (index, title) in titles.iter().enumerate() {
        let sequence = index as i64 + 1;
        let id = sqlx::query("INSERT INTO assets (item_id, title, slug, sequence) VALUES (?, ?, ?, ?)")
            .bind(item_id)
            .bind(title)
            .bind(format!("{}-{}", item_id, sequence))
            .bind(sequence)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
        ids.push(id);
    }

    tx.commit().await?;
    debug!(item_id, count = ids.len(), "Bulk created assets");

    Ok(ids)
}

pub async fn get_asset(pool: &SqlitePool, asset_id: i64) -> Result<Asset> {
    let row = sqlx::query(
        r#"
        SELECT id, item_id, title, slug, sequence, transcription_status, latest_transcription_id
        FROM assets
        WHERE id = ?
        "#,
    )
    .bind(asset_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Asset {}", asset_id)))?;

    Asset::from_row(&row)
}

/// Count assets, optionally restricted to one item
pub async fn count_assets(pool: &SqlitePool, item_id: Option<i64>) -> Result<i64> {
    let row = match item_id {
        Some(item_id) => {
            sqlx::query("SELECT COUNT(*) AS n FROM assets WHERE item_id = ?")
                .bind(item_id)
                .fetch_one(pool)
                .await?
        }
        None => sqlx::query("SELECT COUNT(*) AS n FROM assets").fetch_one(pool).await?,
    };

    Ok(row.try_get("n")?)
}
