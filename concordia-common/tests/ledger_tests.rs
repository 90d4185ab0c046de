//! Integration tests for the transcription ledger
//!
//! Tests cover:
//! - latest / status derivation from the supersession chain
//! - append, submit and review rules (stale and cross-asset writes)
//! - status listings with clamped pagination over a 3 item x 15 asset fixture
//! - repair of the cached status projection after out-of-band inserts

use chrono::{Duration, Utc};
use concordia_common::db::catalog;
use concordia_common::db::init::init_memory_database;
use concordia_common::db::models::User;
use concordia_common::{Error, Ledger, PageRequest, ReviewAction, TranscriptionStatus};

struct Fixture {
    ledger: Ledger,
    anon: User,
    reviewer: User,
    assets: Vec<i64>,
}

/// Test helper: one project, three items of fifteen assets each, three
/// revisions per asset, and the very last revision submitted for review.
async fn setup_fixture() -> Fixture {
    let pool = init_memory_database().await.unwrap();
    let ledger = Ledger::with_defaults(pool.clone());

    let anon = catalog::get_anonymous_user(&pool).await.unwrap();
    let reviewer = catalog::create_user(&pool, "reviewer").await.unwrap();

    let campaign = catalog::create_campaign(&pool, "Test Campaign", "test-campaign").await.unwrap();
    let project = catalog::create_project(&pool, campaign.id, "Test Project", "test-project")
        .await
        .unwrap();

    let mut assets = Vec::new();
    for i in 0..3 {
        let item = catalog::create_item(
            &pool,
            project.id,
            &format!("item_{}", i),
            &format!("Item {}", i),
            None,
        )
        .await
        .unwrap();
        let titles: Vec<String> = (0..15).map(|n| format!("{} - {}", item.id, n)).collect();
        assets.extend(catalog::bulk_create_assets(&pool, item.id, &titles).await.unwrap());
    }

    let mut last = None;
    for &asset_id in &assets {
        for n in 0..3 {
            let t = ledger
                .append_transcription(asset_id, anon.id, &format!("{} - {}", asset_id, n), None)
                .await
                .unwrap();
            last = Some(t);
        }
    }

    let last = last.unwrap();
    ledger.submit_transcription(last.id).await.unwrap();

    Fixture {
        ledger,
        anon,
        reviewer,
        assets,
    }
}

/// Test helper: ledger over an empty catalog with a single asset
async fn setup_single_asset() -> (Ledger, User, i64) {
    let pool = init_memory_database().await.unwrap();
    let ledger = Ledger::with_defaults(pool.clone());
    let anon = catalog::get_anonymous_user(&pool).await.unwrap();

    let campaign = catalog::create_campaign(&pool, "C", "c").await.unwrap();
    let project = catalog::create_project(&pool, campaign.id, "P", "p").await.unwrap();
    let item = catalog::create_item(&pool, project.id, "i", "I", None).await.unwrap();
    let asset = catalog::create_asset(&pool, item.id, "A", "a", 1).await.unwrap();

    (ledger, anon, asset.id)
}

// =============================================================================
// latest / status
// =============================================================================

#[tokio::test]
async fn test_untranscribed_asset_is_not_started() {
    let (ledger, _anon, asset_id) = setup_single_asset().await;

    assert!(ledger.latest(asset_id).await.unwrap().is_none());
    assert_eq!(ledger.status(asset_id).await.unwrap(), TranscriptionStatus::NotStarted);
    assert!(ledger.history(asset_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_asset_is_not_found() {
    let (ledger, anon, _asset_id) = setup_single_asset().await;

    assert!(matches!(ledger.latest(9999).await, Err(Error::NotFound(_))));
    assert!(matches!(ledger.status(9999).await, Err(Error::NotFound(_))));
    assert!(matches!(
        ledger.append_transcription(9999, anon.id, "text", None).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_append_then_latest_round_trip() {
    let (ledger, anon, asset_id) = setup_single_asset().await;

    let t = ledger
        .append_transcription(asset_id, anon.id, "Dear Mother,", None)
        .await
        .unwrap();

    let latest = ledger.latest(asset_id).await.unwrap().unwrap();
    assert_eq!(latest.id, t.id);
    assert_eq!(latest.text, "Dear Mother,");
    assert_eq!(latest.revision, 1);
    assert!(latest.supersedes_id.is_none());
    assert_eq!(ledger.status(asset_id).await.unwrap(), TranscriptionStatus::InProgress);
}

#[tokio::test]
async fn test_status_is_idempotent() {
    let (ledger, anon, asset_id) = setup_single_asset().await;
    ledger.append_transcription(asset_id, anon.id, "one", None).await.unwrap();

    let first = ledger.status(asset_id).await.unwrap();
    let second = ledger.status(asset_id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_submit_latest_marks_submitted() {
    let (ledger, anon, asset_id) = setup_single_asset().await;
    let t = ledger.append_transcription(asset_id, anon.id, "one", None).await.unwrap();

    let submitted = ledger.submit_transcription(t.id).await.unwrap();
    assert!(submitted.submitted_at.is_some());
    assert_eq!(ledger.status(asset_id).await.unwrap(), TranscriptionStatus::Submitted);

    // Submitting twice is rejected
    assert!(matches!(
        ledger.submit_transcription(t.id).await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn test_latest_follows_revision_not_submission_time() {
    let (ledger, anon, asset_id) = setup_single_asset().await;

    let first = ledger.append_transcription(asset_id, anon.id, "first", None).await.unwrap();
    let second = ledger.append_transcription(asset_id, anon.id, "second", None).await.unwrap();

    // Give the older revision a submission timestamp later than anything else
    sqlx::query("UPDATE transcriptions SET submitted_at = ? WHERE id = ?")
        .bind(Utc::now() + Duration::days(1))
        .bind(first.id)
        .execute(ledger.pool())
        .await
        .unwrap();

    let latest = ledger.latest(asset_id).await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);
    assert_eq!(ledger.status(asset_id).await.unwrap(), TranscriptionStatus::InProgress);
}

// =============================================================================
// Supersession chain rules
// =============================================================================

#[tokio::test]
async fn test_default_append_extends_chain() {
    let (ledger, anon, asset_id) = setup_single_asset().await;

    let a = ledger.append_transcription(asset_id, anon.id, "a", None).await.unwrap();
    let b = ledger.append_transcription(asset_id, anon.id, "b", None).await.unwrap();
    let c = ledger.append_transcription(asset_id, anon.id, "c", Some(b.id)).await.unwrap();

    assert_eq!(b.supersedes_id, Some(a.id));
    assert_eq!(c.supersedes_id, Some(b.id));
    assert_eq!(c.revision, 3);

    let history: Vec<i64> = ledger.history(asset_id).await.unwrap().iter().map(|t| t.id).collect();
    assert_eq!(history, vec![c.id, b.id, a.id]);
}

#[tokio::test]
async fn test_stale_supersedes_rejected() {
    let (ledger, anon, asset_id) = setup_single_asset().await;

    let a = ledger.append_transcription(asset_id, anon.id, "a", None).await.unwrap();
    ledger.append_transcription(asset_id, anon.id, "b", Some(a.id)).await.unwrap();

    let err = ledger
        .append_transcription(asset_id, anon.id, "c", Some(a.id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "got {:?}", err);

    // Nothing was written by the rejected append
    assert_eq!(ledger.history(asset_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_cross_asset_supersedes_rejected() {
    let fixture = setup_fixture().await;
    let (asset_a, asset_b) = (fixture.assets[0], fixture.assets[1]);

    let latest_a = fixture.ledger.latest(asset_a).await.unwrap().unwrap();
    let err = fixture
        .ledger
        .append_transcription(asset_b, fixture.anon.id, "wrong chain", Some(latest_a.id))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_submit_superseded_revision_rejected() {
    let (ledger, anon, asset_id) = setup_single_asset().await;

    let a = ledger.append_transcription(asset_id, anon.id, "a", None).await.unwrap();
    ledger.append_transcription(asset_id, anon.id, "b", None).await.unwrap();

    assert!(matches!(
        ledger.submit_transcription(a.id).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        ledger.submit_transcription(424242).await,
        Err(Error::NotFound(_))
    ));
}

// =============================================================================
// Review
// =============================================================================

#[tokio::test]
async fn test_accept_completes_asset() {
    let fixture = setup_fixture().await;
    let asset_id = *fixture.assets.last().unwrap();
    let latest = fixture.ledger.latest(asset_id).await.unwrap().unwrap();

    let reviewed = fixture
        .ledger
        .review_transcription(latest.id, fixture.reviewer.id, ReviewAction::Accept)
        .await
        .unwrap();

    assert!(reviewed.accepted_at.is_some());
    assert_eq!(reviewed.reviewed_by, Some(fixture.reviewer.id));
    assert_eq!(
        fixture.ledger.status(asset_id).await.unwrap(),
        TranscriptionStatus::Completed
    );
}

#[tokio::test]
async fn test_reject_returns_asset_to_in_progress() {
    let fixture = setup_fixture().await;
    let asset_id = *fixture.assets.last().unwrap();
    let latest = fixture.ledger.latest(asset_id).await.unwrap().unwrap();

    fixture
        .ledger
        .review_transcription(latest.id, fixture.reviewer.id, ReviewAction::Reject)
        .await
        .unwrap();

    assert_eq!(
        fixture.ledger.status(asset_id).await.unwrap(),
        TranscriptionStatus::InProgress
    );

    // A rejected revision can be superseded by a fresh one
    let next = fixture
        .ledger
        .append_transcription(asset_id, fixture.anon.id, "corrected", Some(latest.id))
        .await
        .unwrap();
    assert_eq!(next.revision, latest.revision + 1);
}

#[tokio::test]
async fn test_review_rules() {
    let fixture = setup_fixture().await;
    let asset_id = fixture.assets[0];
    let latest = fixture.ledger.latest(asset_id).await.unwrap().unwrap();

    // Not submitted yet
    assert!(matches!(
        fixture
            .ledger
            .review_transcription(latest.id, fixture.reviewer.id, ReviewAction::Accept)
            .await,
        Err(Error::Validation(_))
    ));

    fixture.ledger.submit_transcription(latest.id).await.unwrap();

    // Anonymous user may not review
    assert!(matches!(
        fixture
            .ledger
            .review_transcription(latest.id, fixture.anon.id, ReviewAction::Accept)
            .await,
        Err(Error::Validation(_))
    ));

    // Unknown reviewer
    assert!(matches!(
        fixture
            .ledger
            .review_transcription(latest.id, 9999, ReviewAction::Accept)
            .await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_self_review_rejected() {
    let (ledger, _anon, asset_id) = setup_single_asset().await;
    let author = catalog::create_user(ledger.pool(), "author").await.unwrap();

    let t = ledger.append_transcription(asset_id, author.id, "mine", None).await.unwrap();
    ledger.submit_transcription(t.id).await.unwrap();

    assert!(matches!(
        ledger.review_transcription(t.id, author.id, ReviewAction::Accept).await,
        Err(Error::Validation(_))
    ));
}

// =============================================================================
// Listings
// =============================================================================

#[tokio::test]
async fn test_submitted_asset_listed_for_review_only() {
    let fixture = setup_fixture().await;
    let submitted_asset = *fixture.assets.last().unwrap();

    let reviewable = fixture
        .ledger
        .list_by_status(&TranscriptionStatus::REVIEWABLE, PageRequest::new(1, 23))
        .await
        .unwrap();
    let ids: Vec<i64> = reviewable.objects.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![submitted_asset]);
    assert_eq!(reviewable.objects[0].transcription_status, TranscriptionStatus::Submitted);

    // Walk every transcribable page; the submitted asset never appears
    let mut page = 1;
    let mut seen = 0;
    loop {
        let listing = fixture
            .ledger
            .list_by_status(&TranscriptionStatus::TRANSCRIBABLE, PageRequest::new(page, 23))
            .await
            .unwrap();
        assert!(listing.objects.iter().all(|a| a.id != submitted_asset));
        assert!(listing
            .objects
            .iter()
            .all(|a| TranscriptionStatus::TRANSCRIBABLE.contains(&a.transcription_status)));
        seen += listing.objects.len();
        if !listing.pagination.has_next {
            break;
        }
        page += 1;
    }
    assert_eq!(seen, fixture.assets.len() - 1);
}

#[tokio::test]
async fn test_listing_page_size_is_clamped() {
    let fixture = setup_fixture().await;

    let listing = fixture
        .ledger
        .list_by_status(&[], PageRequest::new(1, 1000))
        .await
        .unwrap();

    assert_eq!(listing.objects.len() as i64, fixture.ledger.max_page_size());
    assert_eq!(listing.pagination.total_count, 45);
    assert!(listing.pagination.has_next);
    assert_eq!(listing.pagination.next_page, Some(2));
}

#[tokio::test]
async fn test_listing_carries_latest_transcription() {
    let fixture = setup_fixture().await;

    let listing = fixture
        .ledger
        .list_by_status(&[], PageRequest::new(1, 23))
        .await
        .unwrap();

    for summary in &listing.objects {
        let latest = fixture.ledger.latest(summary.id).await.unwrap().unwrap();
        let listed = summary.latest_transcription.as_ref().unwrap();
        assert_eq!(listed.id, latest.id);
        assert_eq!(listed.text, latest.text);
        assert_eq!(listed.submitted_by, latest.user_id);
    }
}

#[tokio::test]
async fn test_transcriptions_by_user() {
    let fixture = setup_fixture().await;

    let page = fixture
        .ledger
        .transcriptions_by_user(fixture.anon.id, PageRequest::new(1, 5))
        .await
        .unwrap();
    assert_eq!(page.objects.len(), 5);
    assert_eq!(page.pagination.total_count, 135);
    assert!(page.objects.windows(2).all(|w| w[0].id > w[1].id));

    let empty = fixture
        .ledger
        .transcriptions_by_user(fixture.reviewer.id, PageRequest::default())
        .await
        .unwrap();
    assert!(empty.objects.is_empty());

    assert!(matches!(
        fixture.ledger.transcriptions_by_user(9999, PageRequest::default()).await,
        Err(Error::NotFound(_))
    ));
}

// =============================================================================
// Projection repair
// =============================================================================

#[tokio::test]
async fn test_rebuild_repairs_out_of_band_insert() {
    let (ledger, anon, asset_id) = setup_single_asset().await;

    // Bulk loader writes a revision without touching the projection
    sqlx::query(
        "INSERT INTO transcriptions (asset_id, user_id, revision, text, created_at) VALUES (?, ?, 1, 'bulk', ?)",
    )
    .bind(asset_id)
    .bind(anon.id)
    .bind(Utc::now())
    .execute(ledger.pool())
    .await
    .unwrap();

    let stale = ledger
        .list_by_status(&TranscriptionStatus::REVIEWABLE, PageRequest::default())
        .await
        .unwrap();
    assert!(stale.objects.is_empty());

    let not_started = ledger
        .list_by_status(&[TranscriptionStatus::NotStarted], PageRequest::default())
        .await
        .unwrap();
    assert_eq!(not_started.objects.len(), 1);

    assert_eq!(ledger.rebuild_status_cache().await.unwrap(), 1);
    assert_eq!(ledger.rebuild_status_cache().await.unwrap(), 0);

    let in_progress = ledger
        .list_by_status(&[TranscriptionStatus::InProgress], PageRequest::default())
        .await
        .unwrap();
    assert_eq!(in_progress.objects.len(), 1);
    assert_eq!(
        in_progress.objects[0].latest_transcription.as_ref().unwrap().text,
        "bulk"
    );
}

// =============================================================================
// append + submit in one write
// =============================================================================

#[tokio::test]
async fn test_append_submitted_stores_submitted_revision() {
    let (ledger, anon, asset_id) = setup_single_asset().await;

    let first = ledger
        .append_transcription(asset_id, anon.id, "draft", None)
        .await
        .unwrap();
    let t = ledger
        .append_submitted_transcription(asset_id, anon.id, "final", Some(first.id))
        .await
        .unwrap();

    assert_eq!(t.revision, 2);
    assert_eq!(t.supersedes_id, Some(first.id));
    assert!(t.is_submitted());
    assert_eq!(ledger.status(asset_id).await.unwrap(), TranscriptionStatus::Submitted);

    let listed = ledger
        .list_by_status(&TranscriptionStatus::REVIEWABLE, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(listed.objects.len(), 1);
    assert_eq!(listed.objects[0].id, asset_id);
}

#[tokio::test]
async fn test_rejected_append_submitted_writes_nothing() {
    let (ledger, anon, asset_id) = setup_single_asset().await;

    let first = ledger
        .append_transcription(asset_id, anon.id, "one", None)
        .await
        .unwrap();
    ledger
        .append_transcription(asset_id, anon.id, "two", Some(first.id))
        .await
        .unwrap();

    // Stale supersedes: neither the revision nor the submission may land
    let err = ledger
        .append_submitted_transcription(asset_id, anon.id, "late", Some(first.id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(ledger.history(asset_id).await.unwrap().len(), 2);
    assert_eq!(ledger.status(asset_id).await.unwrap(), TranscriptionStatus::InProgress);
}
