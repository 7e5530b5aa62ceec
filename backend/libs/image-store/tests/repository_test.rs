//! Integration tests against a real PostgreSQL instance
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p image-store -- --ignored`

use image_store::{DbConfig, ImageRepository, PgImageRepository};
use pipeline_core::{ArtifactKind, ProcessingStatus, RecordKey, StatusStore, StatusUpdate};
use uuid::Uuid;

async fn repository() -> PgImageRepository {
    let config = DbConfig::from_env().expect("DATABASE_URL must be set");
    let repo = PgImageRepository::from_config(&config).expect("valid database config");
    repo.run_migrations().await.expect("migrations apply");
    repo
}

fn unique_key() -> RecordKey {
    let name = format!("{}.png", Uuid::new_v4());
    RecordKey::new(format!("uploads/{name}"), name)
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_upsert_creates_missing_row() {
    let repo = repository().await;
    let key = unique_key();

    let rows = repo
        .upsert(
            &key,
            &StatusUpdate::completed(ArtifactKind::Thumbnail, "thumbnails/x.jpg"),
        )
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let record = repo.find_by_key(&key.business_key).await.unwrap().unwrap();
    assert_eq!(record.thumbnail_status, ProcessingStatus::Completed);
    assert_eq!(record.thumbnail_ref.as_deref(), Some("thumbnails/x.jpg"));
    assert_eq!(record.caption_status, ProcessingStatus::Pending);
    assert_eq!(record.filename, key.filename);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_consumers_write_disjoint_columns() {
    let repo = repository().await;
    let key = unique_key();

    repo.upsert(&key, &StatusUpdate::completed(ArtifactKind::Caption, "a red bicycle"))
        .await
        .unwrap();
    repo.upsert(&key, &StatusUpdate::failed(ArtifactKind::Thumbnail, None))
        .await
        .unwrap();

    let record = repo.find_by_key(&key.business_key).await.unwrap().unwrap();
    assert_eq!(record.caption_status, ProcessingStatus::Completed);
    assert_eq!(record.caption_text.as_deref(), Some("a red bicycle"));
    assert_eq!(record.thumbnail_status, ProcessingStatus::Failed);
    assert_eq!(record.thumbnail_ref, None);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_failed_retry_clears_reference() {
    let repo = repository().await;
    let key = unique_key();

    repo.upsert(
        &key,
        &StatusUpdate::completed(ArtifactKind::Thumbnail, "thumbnails/y.jpg"),
    )
    .await
    .unwrap();
    repo.upsert(&key, &StatusUpdate::failed(ArtifactKind::Thumbnail, None))
        .await
        .unwrap();

    let record = repo.find_by_key(&key.business_key).await.unwrap().unwrap();
    assert_eq!(record.thumbnail_status, ProcessingStatus::Failed);
    assert_eq!(record.thumbnail_ref, None);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_identical_upsert_reports_zero_rows() {
    let repo = repository().await;
    let key = unique_key();
    let update = StatusUpdate::completed(ArtifactKind::Caption, "same caption");

    assert_eq!(repo.upsert(&key, &update).await.unwrap(), 1);
    assert_eq!(repo.upsert(&key, &update).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_upsert_keeps_created_at_and_filename() {
    let repo = repository().await;
    let key = unique_key();

    let created = repo.create_pending(&key).await.unwrap();
    let renamed = RecordKey::new(key.business_key.clone(), "other.png");
    repo.upsert(&renamed, &StatusUpdate::completed(ArtifactKind::Caption, "text"))
        .await
        .unwrap();

    let record = repo.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(record.created_at, created.created_at);
    assert_eq!(record.filename, key.filename);
    assert!(record.updated_at >= created.updated_at);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_update_status_does_not_insert() {
    let repo = repository().await;
    let key = unique_key();

    let rows = repo
        .update_status(
            &key.business_key,
            &StatusUpdate::completed(ArtifactKind::Caption, "text"),
        )
        .await
        .unwrap();
    assert_eq!(rows, 0);
    assert!(repo.find_by_key(&key.business_key).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_list_recent_orders_newest_first() {
    let repo = repository().await;
    let first = repo.create_pending(&unique_key()).await.unwrap();
    let second = repo.create_pending(&unique_key()).await.unwrap();

    let records = repo.list_recent(500).await.unwrap();
    let first_pos = records.iter().position(|r| r.id == first.id);
    let second_pos = records.iter().position(|r| r.id == second.id);
    assert!(second_pos.unwrap() < first_pos.unwrap());
}
