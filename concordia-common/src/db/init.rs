//! Database initialization
//!
//! Opens (creating if needed) the SQLite database, applies connection
//! pragmas and creates the schema. Every `CREATE` is idempotent so this is
//! safe to run on each startup.

use crate::config::DatabaseConfig;
use crate::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Username of the sentinel account that owns unauthenticated contributions
pub const ANONYMOUS_USERNAME: &str = "anonymous";

/// Initialize database connection with default tuning and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    init_database_with(db_path, &DatabaseConfig::default()).await
}

/// Initialize database connection and create tables if needed
pub async fn init_database_with(db_path: &Path, config: &DatabaseConfig) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL lets listing reads proceed while a ledger write holds the lock.
    // foreign_keys and busy_timeout are per-connection, so they go on the
    // connect options rather than a one-off PRAGMA.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    info!(
        busy_timeout_ms = config.busy_timeout_ms,
        max_connections = config.max_connections,
        "Database ready"
    );

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Each SQLite `:memory:` connection is a separate database, so the pool is
/// capped at one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create every table, index and seed row
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_campaigns_table(pool).await?;
    create_projects_table(pool).await?;
    create_items_table(pool).await?;
    create_assets_table(pool).await?;
    create_transcriptions_table(pool).await?;
    seed_anonymous_user(pool).await?;
    Ok(())
}

pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            is_anonymous INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_campaigns_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaigns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            slug TEXT NOT NULL,
            UNIQUE (campaign_id, slug)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            item_id TEXT NOT NULL,
            title TEXT NOT NULL,
            slug TEXT,
            UNIQUE (project_id, item_id),
            UNIQUE (project_id, slug)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_assets_table(pool: &SqlitePool) -> Result<()> {
    // transcription_status / latest_transcription_id are the cached projection
    // of the transcription chain; only the ledger write path updates them.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            slug TEXT NOT NULL,
            sequence INTEGER NOT NULL DEFAULT 1,
            transcription_status TEXT NOT NULL DEFAULT 'not_started'
                CHECK (transcription_status IN ('not_started', 'in_progress', 'submitted', 'completed')),
            latest_transcription_id INTEGER REFERENCES transcriptions(id),
            UNIQUE (item_id, slug)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_assets_status ON assets(transcription_status, id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_transcriptions_table(pool: &SqlitePool) -> Result<()> {
    // revision is the per-asset monotonic sequence that defines recency.
    // UNIQUE (supersedes_id) forbids two revisions superseding the same one,
    // which keeps each asset's chain linear.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            asset_id INTEGER NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id),
            revision INTEGER NOT NULL CHECK (revision >= 1),
            supersedes_id INTEGER REFERENCES transcriptions(id),
            text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            submitted_at TEXT,
            accepted_at TEXT,
            rejected_at TEXT,
            reviewed_by INTEGER REFERENCES users(id),
            UNIQUE (asset_id, revision),
            UNIQUE (supersedes_id),
            CHECK (accepted_at IS NULL OR rejected_at IS NULL)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transcriptions_user ON transcriptions(user_id, id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_anonymous_user(pool: &SqlitePool) -> Result<()> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO users (username, is_anonymous, created_at) VALUES (?, 1, ?)",
    )
    .bind(ANONYMOUS_USERNAME)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        info!("Created anonymous user");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();

        let anonymous: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_anonymous = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(anonymous, 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = init_memory_database().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO assets (item_id, title, slug) VALUES (999, 'orphan', 'orphan')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err(), "asset without item must be rejected");
    }
}
