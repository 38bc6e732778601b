//! Repository tests against a live PostgreSQL database.
//!
//! Run with `DATABASE_URL` set and `--ignored`.

use sqlx::PgPool;
use uuid::Uuid;
use visionary_core::job::JobKind;
use visionary_db::models::history::{CreateHistory, UpdateHistory};
use visionary_db::repositories::{HistoryRepo, ProcessingMetadataRepo};

fn new_history(prediction_id: &str) -> CreateHistory {
    CreateHistory {
        id: Uuid::new_v4(),
        original_prompt: Some("A lighthouse at dawn".into()),
        model_id: Some("flux-dev".into()),
        replicate_model: Some("black-forest-labs/flux-dev".into()),
        status: "processing".into(),
        progress: 15,
        replicate_prediction_id: Some(prediction_id.into()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Test: upsert creates, then overwrites by id
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn upsert_is_idempotent_by_id(pool: PgPool) {
    let input = new_history("p-1");
    let created = HistoryRepo::upsert(&pool, &input).await.unwrap();
    assert_eq!(created.media_url.as_deref(), Some("pending"));
    assert!(!created.saved_to_storage);

    let again = HistoryRepo::upsert(&pool, &CreateHistory { progress: 20, ..input.clone() })
        .await
        .unwrap();
    assert_eq!(again.id, created.id);
    assert_eq!(again.progress, 20);
}

// ---------------------------------------------------------------------------
// Test: lookup by prediction id uses the column for the job kind
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn find_by_prediction_disambiguates_kind(pool: PgPool) {
    let created = HistoryRepo::upsert(&pool, &new_history("p-2")).await.unwrap();

    let base = HistoryRepo::find_by_prediction(&pool, "p-2", JobKind::BaseGeneration)
        .await
        .unwrap();
    assert_eq!(base.map(|r| r.id), Some(created.id));

    let swap = HistoryRepo::find_by_prediction(&pool, "p-2", JobKind::FaceSwap)
        .await
        .unwrap();
    assert!(swap.is_none());
}

// ---------------------------------------------------------------------------
// Test: partial update keeps untouched columns
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn update_by_id_is_partial(pool: PgPool) {
    let created = HistoryRepo::upsert(&pool, &new_history("p-3")).await.unwrap();
    let update = UpdateHistory {
        status: Some("failed".into()),
        error_message: Some("CUDA OOM".into()),
        completed: true,
        ..Default::default()
    };
    let updated = HistoryRepo::update_by_id(&pool, created.id, &update)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, "failed");
    assert_eq!(updated.progress, 15);
    assert_eq!(updated.error_message.as_deref(), Some("CUDA OOM"));
    assert!(updated.completed_at.is_some());
}

// ---------------------------------------------------------------------------
// Test: active-key switch is compare-and-set
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn switch_active_prediction_only_once(pool: PgPool) {
    let created = HistoryRepo::upsert(&pool, &new_history("base-1")).await.unwrap();
    let update = UpdateHistory {
        status: Some("face_swap_starting".into()),
        progress: Some(50),
        ..Default::default()
    };

    let first = HistoryRepo::switch_active_prediction(
        &pool, created.id, "base-1", "swap-1", JobKind::FaceSwap, &update,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(first.active_prediction_id(), Some("swap-1"));

    let second = HistoryRepo::switch_active_prediction(
        &pool, created.id, "base-1", "swap-2", JobKind::FaceSwap, &update,
    )
    .await
    .unwrap();
    assert!(second.is_none());
}

// ---------------------------------------------------------------------------
// Test: save flag flips at most once
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn mark_saved_flips_once(pool: PgPool) {
    let created = HistoryRepo::upsert(&pool, &new_history("p-4")).await.unwrap();

    assert!(HistoryRepo::mark_saved(&pool, created.id, "https://s/final.png").await.unwrap());
    assert!(!HistoryRepo::mark_saved(&pool, created.id, "https://s/other.png").await.unwrap());

    let record = HistoryRepo::find_by_id(&pool, created.id).await.unwrap().unwrap();
    assert_eq!(record.saved_media_url(), Some("https://s/final.png"));
}

// ---------------------------------------------------------------------------
// Test: cancellation flag flips at most once
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn cancellation_attempt_is_recorded_once(pool: PgPool) {
    let meta = ProcessingMetadataRepo::find_or_create(&pool, "stuck-1").await.unwrap();
    assert!(!meta.cancellation_attempted);

    assert!(ProcessingMetadataRepo::mark_cancellation_attempted(&pool, "stuck-1").await.unwrap());
    assert!(!ProcessingMetadataRepo::mark_cancellation_attempted(&pool, "stuck-1").await.unwrap());

    let meta = ProcessingMetadataRepo::find_or_create(&pool, "stuck-1").await.unwrap();
    assert!(meta.cancellation_attempted);
}

// ---------------------------------------------------------------------------
// Test: a released cancellation flag can be claimed again
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn released_cancellation_can_be_reclaimed(pool: PgPool) {
    assert!(!ProcessingMetadataRepo::release_cancellation(&pool, "stuck-2").await.unwrap());

    assert!(ProcessingMetadataRepo::mark_cancellation_attempted(&pool, "stuck-2").await.unwrap());
    assert!(ProcessingMetadataRepo::release_cancellation(&pool, "stuck-2").await.unwrap());
    assert!(!ProcessingMetadataRepo::release_cancellation(&pool, "stuck-2").await.unwrap());

    let meta = ProcessingMetadataRepo::find_or_create(&pool, "stuck-2").await.unwrap();
    assert!(!meta.cancellation_attempted);
    assert!(ProcessingMetadataRepo::mark_cancellation_attempted(&pool, "stuck-2").await.unwrap());
}

// ---------------------------------------------------------------------------
// Test: listing is newest first and scoped to the user
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn list_by_user_scopes_and_orders(pool: PgPool) {
    let user = Uuid::new_v4();
    for p in ["l-1", "l-2", "l-3"] {
        let input = CreateHistory {
            user_id: Some(user),
            ..new_history(p)
        };
        HistoryRepo::upsert(&pool, &input).await.unwrap();
    }
    HistoryRepo::upsert(&pool, &new_history("other")).await.unwrap();

    let items = HistoryRepo::list_by_user(&pool, user, Some(2), None).await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0].created_at >= items[1].created_at);
    assert!(items.iter().all(|r| r.user_id == Some(user)));
}
