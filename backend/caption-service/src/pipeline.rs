//! Caption pipeline: download the upload, ask the model to describe it

use crate::gemini::InferenceBackend;
use crate::mime::sniff_content_type;
use async_trait::async_trait;
use pipeline_core::{
    codes, ArtifactKind, ArtifactOutput, ArtifactPipeline, InvocationContext, ObjectStore,
    PipelineError, Result, SourceObject,
};
use std::sync::Arc;
use tracing::{error, info};

pub struct CaptionPipeline {
    store: Arc<dyn ObjectStore>,
    backend: Arc<dyn InferenceBackend>,
    prompt: String,
}

impl CaptionPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        backend: Arc<dyn InferenceBackend>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            store,
            backend,
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
impl ArtifactPipeline for CaptionPipeline {
    fn artifact(&self) -> ArtifactKind {
        ArtifactKind::Caption
    }

    async fn process(
        &self,
        _ctx: &InvocationContext,
        source: &SourceObject,
    ) -> Result<ArtifactOutput> {
        let image = self.store.fetch(&source.container, &source.key).await?;

        if image.is_empty() {
            error!(key = %source.key, "Source object is empty");
            return Err(PipelineError::transform(
                codes::EMPTY_IMAGE_DATA,
                "Image data cannot be empty",
            ));
        }

        let content_type = sniff_content_type(&image);
        let caption = self.backend.describe(&image, content_type, &self.prompt).await?;

        let caption_length = caption.chars().count();
        info!(key = %source.key, caption_length, "Caption generated");

        Ok(ArtifactOutput::new(caption)
            .with_detail("caption_length", caption_length)
            .with_detail("content_type", content_type))
    }
}
