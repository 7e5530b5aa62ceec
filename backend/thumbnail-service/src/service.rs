//! Thumbnail pipeline: download the upload, shrink it, store the JPEG

use crate::processor::{ThumbnailProcessor, THUMBNAIL_CONTENT_TYPE};
use async_trait::async_trait;
use pipeline_core::{
    ArtifactKind, ArtifactOutput, ArtifactPipeline, DerivedPrefix, InvocationContext, ObjectStore,
    Result, SourceObject,
};
use std::sync::Arc;
use tracing::info;

/// Key of the thumbnail derived from `source`: `<prefix><stem>.jpg`.
///
/// Sources in different directories with the same stem map to the same key.
pub fn thumbnail_key(prefix: &DerivedPrefix, source: &SourceObject) -> String {
    prefix.join(&format!("{}.jpg", source.stem()))
}

pub struct ThumbnailPipeline {
    store: Arc<dyn ObjectStore>,
    processor: Arc<ThumbnailProcessor>,
    derived_prefix: DerivedPrefix,
    derived_bucket: Option<String>,
}

impl ThumbnailPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        processor: ThumbnailProcessor,
        derived_prefix: DerivedPrefix,
        derived_bucket: Option<String>,
    ) -> Self {
        Self {
            store,
            processor: Arc::new(processor),
            derived_prefix,
            derived_bucket,
        }
    }
}

#[async_trait]
impl ArtifactPipeline for ThumbnailPipeline {
    fn artifact(&self) -> ArtifactKind {
        ArtifactKind::Thumbnail
    }

    async fn process(
        &self,
        _ctx: &InvocationContext,
        source: &SourceObject,
    ) -> Result<ArtifactOutput> {
        let original = self.store.fetch(&source.container, &source.key).await?;

        let thumbnail = self.processor.clone().generate_async(original).await?;

        let target_bucket = self.derived_bucket.as_deref().unwrap_or(&source.container);
        let key = thumbnail_key(&self.derived_prefix, source);
        let (width, height) = (thumbnail.width, thumbnail.height);

        self.store
            .put(target_bucket, &key, thumbnail.data, THUMBNAIL_CONTENT_TYPE)
            .await?;

        info!(
            bucket = target_bucket,
            key = %key,
            width,
            height,
            "Thumbnail stored"
        );

        Ok(ArtifactOutput::new(key)
            .with_detail("thumbnail_bucket", target_bucket)
            .with_detail("width", width)
            .with_detail("height", height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_key() {
        let prefix = DerivedPrefix::default();
        let source = SourceObject::new("b", "uploads/2024/cat.photo.png");
        assert_eq!(thumbnail_key(&prefix, &source), "thumbnails/cat.photo.jpg");
    }

    #[test]
    fn test_thumbnail_key_without_extension() {
        let prefix = DerivedPrefix::new("thumbs").unwrap();
        let source = SourceObject::new("b", "raw");
        assert_eq!(thumbnail_key(&prefix, &source), "thumbs/raw.jpg");
    }
}
