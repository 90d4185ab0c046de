//! Integration tests for concurrent ledger writes
//!
//! Uses an on-disk database so that several pooled connections really
//! compete for the SQLite write lock.

use concordia_common::config::{DatabaseConfig, ListingConfig};
use concordia_common::db::catalog;
use concordia_common::db::init::init_database_with;
use concordia_common::db::ImmediateTransaction;
use concordia_common::{Error, Ledger, TranscriptionStatus};
use sqlx::SqlitePool;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinSet;

/// Test helper: file-backed pool plus one asset
async fn setup_file_db(temp_dir: &TempDir, config: DatabaseConfig) -> (SqlitePool, i64, i64) {
    let db_path = temp_dir.path().join("concordia.db");
    let pool = init_database_with(&db_path, &config).await.unwrap();

    let anon = catalog::get_anonymous_user(&pool).await.unwrap();
    let campaign = catalog::create_campaign(&pool, "C", "c").await.unwrap();
    let project = catalog::create_project(&pool, campaign.id, "P", "p").await.unwrap();
    let item = catalog::create_item(&pool, project.id, "i", "I", None).await.unwrap();
    let asset = catalog::create_asset(&pool, item.id, "A", "a", 1).await.unwrap();

    (pool, asset.id, anon.id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_keep_chain_linear() {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        busy_timeout_ms: 2000,
        max_lock_wait_ms: 10_000,
        max_connections: 8,
    };
    let (pool, asset_id, anon_id) = setup_file_db(&temp_dir, config).await;
    let ledger = Ledger::new(pool, &config, &ListingConfig::default());

    let mut join_set = JoinSet::new();
    for i in 0..2 {
        let ledger = ledger.clone();
        join_set.spawn(async move {
            ledger
                .append_transcription(asset_id, anon_id, &format!("writer {}", i), None)
                .await
                .expect("concurrent append should succeed")
        });
    }

    let mut written = Vec::new();
    while let Some(result) = join_set.join_next().await {
        written.push(result.expect("Task panicked"));
    }

    // Both rows persisted with distinct, consecutive revisions
    written.sort_by_key(|t| t.revision);
    assert_eq!(written[0].revision, 1);
    assert_eq!(written[1].revision, 2);
    assert_eq!(written[1].supersedes_id, Some(written[0].id));

    // Latest is the one that committed last
    let latest = ledger.latest(asset_id).await.unwrap().unwrap();
    assert_eq!(latest.id, written[1].id);

    let history = ledger.history(asset_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(ledger.status(asset_id).await.unwrap(), TranscriptionStatus::InProgress);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_appends_no_lost_update() {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        busy_timeout_ms: 2000,
        max_lock_wait_ms: 20_000,
        max_connections: 8,
    };
    let (pool, asset_id, anon_id) = setup_file_db(&temp_dir, config).await;
    let ledger = Ledger::new(pool.clone(), &config, &ListingConfig::default());

    let mut join_set = JoinSet::new();
    for i in 0..10 {
        let ledger = ledger.clone();
        join_set.spawn(async move {
            ledger
                .append_transcription(asset_id, anon_id, &format!("writer {}", i), None)
                .await
        });
    }

    while let Some(result) = join_set.join_next().await {
        result.expect("Task panicked").expect("append failed");
    }

    let history = ledger.history(asset_id).await.unwrap();
    assert_eq!(history.len(), 10);
    let revisions: Vec<i64> = history.iter().map(|t| t.revision).collect();
    assert_eq!(revisions, (1..=10).rev().collect::<Vec<i64>>());

    // Cached projection points at the highest committed revision
    let cached_latest: Option<i64> =
        sqlx::query_scalar("SELECT latest_transcription_id FROM assets WHERE id = ?")
            .bind(asset_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(cached_latest, Some(history[0].id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lock_held_past_retry_window_is_conflict() {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        busy_timeout_ms: 20,
        max_lock_wait_ms: 150,
        max_connections: 4,
    };
    let (pool, asset_id, anon_id) = setup_file_db(&temp_dir, config).await;
    let ledger = Ledger::new(pool.clone(), &config, &ListingConfig::default());

    // Another writer holds the lock for longer than the retry window
    let blocker = ImmediateTransaction::begin(&pool).await.unwrap();

    let err = ledger
        .append_transcription(asset_id, anon_id, "blocked", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {:?}", err);

    blocker.rollback().await.unwrap();

    // Nothing leaked from the failed attempts
    assert!(ledger.latest(asset_id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lock_released_within_retry_window_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        busy_timeout_ms: 20,
        max_lock_wait_ms: 5000,
        max_connections: 4,
    };
    let (pool, asset_id, anon_id) = setup_file_db(&temp_dir, config).await;
    let ledger = Ledger::new(pool.clone(), &config, &ListingConfig::default());

    let blocker = ImmediateTransaction::begin(&pool).await.unwrap();
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        blocker.commit().await.unwrap();
    });

    let t = ledger
        .append_transcription(asset_id, anon_id, "eventually", None)
        .await
        .unwrap();
    release.await.unwrap();

    assert_eq!(t.revision, 1);
    assert_eq!(ledger.latest(asset_id).await.unwrap().unwrap().id, t.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_append_submitted_all_succeed() {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        busy_timeout_ms: 2000,
        max_lock_wait_ms: 20_000,
        max_connections: 8,
    };
    let (pool, asset_id, anon_id) = setup_file_db(&temp_dir, config).await;
    let ledger = Ledger::new(pool, &config, &ListingConfig::default());

    let mut join_set = JoinSet::new();
    for i in 0..10 {
        let ledger = ledger.clone();
        join_set.spawn(async move {
            ledger
                .append_submitted_transcription(asset_id, anon_id, &format!("writer {}", i), None)
                .await
        });
    }

    let mut written = Vec::new();
    while let Some(result) = join_set.join_next().await {
        let t = result.expect("Task panicked").expect("append failed");
        assert!(t.is_submitted());
        written.push(t.id);
    }

    // Every reported success is in the chain, and nothing else is
    let history = ledger.history(asset_id).await.unwrap();
    let mut persisted: Vec<i64> = history.iter().map(|t| t.id).collect();
    persisted.sort();
    written.sort();
    assert_eq!(persisted, written);
    assert_eq!(ledger.status(asset_id).await.unwrap(), TranscriptionStatus::Submitted);
}
