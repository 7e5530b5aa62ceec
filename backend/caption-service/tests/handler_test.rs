//! End-to-end caption handler tests with in-memory stores and a mocked model

use async_trait::async_trait;
use caption_service::{
    build_dispatcher, dispatcher, inference_backend, CaptionPipeline, HandlerConfig,
    InferenceBackend,
};
use mockall::mock;
use pipeline_core::testing::{MemoryObjectStore, MemoryStatusStore};
use pipeline_core::{
    codes, ArtifactKind, DerivedPrefix, Dispatcher, ErrorKind, HandlerResponse, InvocationContext,
    PipelineError, ProcessingStatus, RecordKey, Result, StatusStore, StatusUpdate,
};
use serde_json::{json, Value};
use std::sync::Arc;

mock! {
    pub Model {}

    #[async_trait]
    impl InferenceBackend for Model {
        async fn describe(
            &self,
            image: &[u8],
            content_type: &str,
            prompt: &str,
        ) -> Result<String>;
    }
}

const BUCKET: &str = "uploads-bucket";
const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

struct Harness {
    objects: Arc<MemoryObjectStore>,
    statuses: Arc<MemoryStatusStore>,
    dispatcher: Dispatcher<CaptionPipeline>,
}

fn harness(model: MockModel) -> Harness {
    harness_with_backend(Arc::new(model))
}

fn harness_with_backend(backend: Arc<dyn InferenceBackend>) -> Harness {
    let objects = Arc::new(MemoryObjectStore::new());
    let statuses = Arc::new(MemoryStatusStore::new());
    let pipeline =
        CaptionPipeline::new(objects.clone(), backend, "Describe this image in detail.");
    let dispatcher = Dispatcher::new(pipeline, statuses.clone(), DerivedPrefix::default());
    Harness {
        objects,
        statuses,
        dispatcher,
    }
}

fn replying(caption: &'static str) -> MockModel {
    let mut model = MockModel::new();
    model
        .expect_describe()
        .returning(move |_, _, _| Ok(caption.to_string()));
    model
}

fn refusing() -> MockModel {
    let mut model = MockModel::new();
    model.expect_describe().returning(|_, _, _| {
        Err(PipelineError::transform(
            codes::CONTENT_BLOCKED,
            "Content generation was blocked: SAFETY",
        ))
    });
    model
}

fn untouched() -> MockModel {
    let mut model = MockModel::new();
    model.expect_describe().times(0);
    model
}

fn direct_event(key: &str) -> Value {
    json!({"Records": [{"s3": {"bucket": {"name": BUCKET}, "object": {"key": key}}}]})
}

fn enveloped_event(key: &str) -> Value {
    json!({"detail": {"bucket": {"name": BUCKET}, "object": {"key": key}}})
}

fn ctx() -> InvocationContext {
    InvocationContext::new("caption")
}

#[tokio::test]
async fn test_caption_is_recorded_on_success() {
    let h = harness(replying("A cat asleep on a windowsill."));
    h.objects.insert(BUCKET, "uploads/cat.jpg", JPEG_HEADER.to_vec());

    let response = h
        .dispatcher
        .handle(&direct_event("uploads/cat.jpg"), &ctx())
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(
        response.detail("caption_text"),
        Some(&json!("A cat asleep on a windowsill."))
    );
    assert_eq!(response.detail("content_type"), Some(&json!("image/jpeg")));

    let row = h.statuses.get("uploads/cat.jpg").unwrap();
    assert_eq!(row.caption_status, ProcessingStatus::Completed);
    assert_eq!(row.caption_text.as_deref(), Some("A cat asleep on a windowsill."));
    assert_eq!(row.thumbnail_status, ProcessingStatus::Pending);
    assert_eq!(row.filename, "cat.jpg");
}

#[tokio::test]
async fn test_enveloped_event_is_captioned() {
    let h = harness(replying("A dog."));
    h.objects.insert(BUCKET, "uploads/dog.jpg", JPEG_HEADER.to_vec());

    let response = h
        .dispatcher
        .handle(&enveloped_event("uploads/dog.jpg"), &ctx())
        .await
        .unwrap();

    match response {
        HandlerResponse::Success { business_key, artifact, .. } => {
            assert_eq!(business_key, "uploads/dog.jpg");
            assert_eq!(artifact, ArtifactKind::Caption);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn test_blocked_content_records_failure_note() {
    let h = harness(refusing());
    h.objects.insert(BUCKET, "uploads/x.jpg", JPEG_HEADER.to_vec());

    let err = h
        .dispatcher
        .handle(&direct_event("uploads/x.jpg"), &ctx())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transform);
    assert_eq!(err.code(), codes::CONTENT_BLOCKED);

    let row = h.statuses.get("uploads/x.jpg").unwrap();
    assert_eq!(row.caption_status, ProcessingStatus::Failed);
    let note = row.caption_text.unwrap();
    assert!(note.starts_with("Transform error: "));
    assert!(note.contains("SAFETY"));
}

#[tokio::test]
async fn test_empty_object_is_rejected_before_inference() {
    let h = harness(untouched());
    h.objects.insert(BUCKET, "uploads/empty.jpg", Vec::new());

    let err = h
        .dispatcher
        .handle(&direct_event("uploads/empty.jpg"), &ctx())
        .await
        .unwrap_err();

    assert_eq!(err.code(), codes::EMPTY_IMAGE_DATA);
    let row = h.statuses.get("uploads/empty.jpg").unwrap();
    assert_eq!(row.caption_status, ProcessingStatus::Failed);
}

#[tokio::test]
async fn test_thumbnail_keys_are_skipped() {
    let h = harness(untouched());

    let response = h
        .dispatcher
        .handle(&direct_event("thumbnails/cat.jpg"), &ctx())
        .await
        .unwrap();

    assert!(response.is_skipped());
    assert_eq!(h.objects.fetch_calls(), 0);
    assert_eq!(h.statuses.upsert_calls(), 0);
}

#[tokio::test]
async fn test_model_error_outranks_status_store_outage() {
    let h = harness(refusing());
    h.objects.insert(BUCKET, "uploads/x.jpg", JPEG_HEADER.to_vec());
    h.statuses.fail_upserts(true);

    let err = h
        .dispatcher
        .handle(&direct_event("uploads/x.jpg"), &ctx())
        .await
        .unwrap_err();

    assert_eq!(err.code(), codes::CONTENT_BLOCKED);
    assert_eq!(h.statuses.upsert_calls(), 1);
}

#[tokio::test]
async fn test_status_store_outage_after_caption_is_reported() {
    let h = harness(replying("A tree."));
    h.objects.insert(BUCKET, "uploads/tree.jpg", JPEG_HEADER.to_vec());
    h.statuses.fail_upserts(true);

    let err = h
        .dispatcher
        .handle(&direct_event("uploads/tree.jpg"), &ctx())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StatusStore);
}

#[tokio::test]
async fn test_thumbnail_columns_survive_caption_write() {
    let h = harness(replying("A red bicycle."));
    h.objects.insert(BUCKET, "uploads/bike.jpg", JPEG_HEADER.to_vec());
    h.statuses
        .upsert(
            &RecordKey::new("uploads/bike.jpg", "bike.jpg"),
            &StatusUpdate::completed(ArtifactKind::Thumbnail, "thumbnails/bike.jpg"),
        )
        .await
        .unwrap();

    h.dispatcher
        .handle(&direct_event("uploads/bike.jpg"), &ctx())
        .await
        .unwrap();

    let row = h.statuses.get("uploads/bike.jpg").unwrap();
    assert_eq!(row.thumbnail_ref.as_deref(), Some("thumbnails/bike.jpg"));
    assert_eq!(row.thumbnail_status, ProcessingStatus::Completed);
    assert_eq!(row.caption_text.as_deref(), Some("A red bicycle."));
}

#[tokio::test]
async fn test_download_failure_records_failed_caption() {
    let h = harness(untouched());

    let err = h
        .dispatcher
        .handle(&direct_event("uploads/gone.jpg"), &ctx())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ObjectStore);
    let row = h.statuses.get("uploads/gone.jpg").unwrap();
    assert_eq!(row.caption_status, ProcessingStatus::Failed);
    assert!(row.caption_text.unwrap().starts_with("Object store error: "));
}

fn config(pairs: &[(&str, &str)]) -> HandlerConfig {
    let vars: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    HandlerConfig::from_vars(&vars).unwrap()
}

#[tokio::test]
async fn test_derived_key_is_skipped_without_api_key() {
    let config = config(&[("DATABASE_URL", "postgres://u:p@127.0.0.1:1/images")]);
    let dispatcher = build_dispatcher(config).await;

    let response = dispatcher
        .handle(&direct_event("thumbnails/a.jpg"), &ctx())
        .await
        .unwrap();

    assert!(response.is_skipped());
    assert_eq!(serde_json::to_value(&response).unwrap()["status"], "skipped");
}

#[tokio::test]
async fn test_missing_api_key_records_failed_caption() {
    let config = config(&[("DATABASE_URL", "postgres://u:p@127.0.0.1:1/images")]);
    let h = harness_with_backend(inference_backend(&config.service));
    h.objects.insert(BUCKET, "uploads/cat.jpg", JPEG_HEADER.to_vec());

    let err = h
        .dispatcher
        .handle(&direct_event("uploads/cat.jpg"), &ctx())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.code(), codes::INFERENCE_KEY_MISSING);

    let row = h.statuses.get("uploads/cat.jpg").unwrap();
    assert_eq!(row.caption_status, ProcessingStatus::Failed);
    assert_eq!(
        row.caption_text.as_deref(),
        Some("Configuration error: INFERENCE_API_KEY is not configured")
    );
}

#[tokio::test]
async fn test_missing_database_settings_fail_real_uploads() {
    let config = config(&[("INFERENCE_API_KEY", "test-key")]);
    let objects = Arc::new(MemoryObjectStore::new());
    objects.insert(BUCKET, "uploads/cat.jpg", JPEG_HEADER.to_vec());
    let statuses = image_store::connect_status_store(config.db, false).await;
    let dispatcher = dispatcher(
        config.service,
        objects,
        Arc::new(replying("A cat.")),
        statuses,
    );

    let err = dispatcher
        .handle(&direct_event("uploads/cat.jpg"), &ctx())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.code(), codes::DB_CONFIG_MISSING);
}
