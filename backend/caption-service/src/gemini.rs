//! Gemini generateContent integration for image captioning
use crate::config::InferenceConfig;
use async_trait::async_trait;
use base64::Engine;
use pipeline_core::{codes, ConfigFault, PipelineError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Longest excerpt of an error body kept in error messages
const ERROR_BODY_LIMIT: usize = 500;

/// Finish reasons that mean the model refused to answer
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
    "RECITATION",
    "IMAGE_SAFETY",
];

/// Multimodal model turning image bytes plus a prompt into text
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Describe `image`.
    ///
    /// Blocked output maps to `CONTENT_BLOCKED`, missing text to
    /// `EMPTY_RESPONSE`, and transport or protocol failures to
    /// `INFERENCE_API_ERROR`.
    async fn describe(&self, image: &[u8], content_type: &str, prompt: &str) -> Result<String>;
}

// ============================================
// Request types
// ============================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

// ============================================
// Response types
// ============================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Turn a parsed response into caption text or a classified failure
pub(crate) fn interpret_response(response: GenerateContentResponse) -> Result<String> {
    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);

    let candidate = response.candidates.into_iter().next();
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

    let text: String = candidate
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let caption = text.trim();
    if !caption.is_empty() {
        return Ok(caption.to_string());
    }

    if let Some(reason) = block_reason {
        return Err(PipelineError::transform(
            codes::CONTENT_BLOCKED,
            format!("Content generation was blocked: {reason}"),
        ));
    }

    match finish_reason {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
            Err(PipelineError::transform(
                codes::CONTENT_BLOCKED,
                format!("Content generation was blocked: {reason}"),
            ))
        }
        _ => Err(PipelineError::transform(
            codes::EMPTY_RESPONSE,
            "Model returned an empty response",
        )),
    }
}

fn api_error(
    message: impl Into<String>,
    source: impl Into<pipeline_core::error::BoxError>,
) -> PipelineError {
    PipelineError::transform_with_source(codes::INFERENCE_API_ERROR, message, source)
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                PipelineError::configuration(
                    codes::INVALID_CONFIG,
                    format!("Failed to create HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model_name.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl InferenceBackend for GeminiClient {
    async fn describe(&self, image: &[u8], content_type: &str, prompt: &str) -> Result<String> {
        info!(model = %self.model, content_type, size = image.len(), "Requesting caption");

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: content_type.to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(image),
                        }),
                    },
                    Part {
                        text: Some(prompt.to_string()),
                        inline_data: None,
                    },
                ],
            }],
        };

        let start = std::time::Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Inference request failed");
                api_error(format!("Inference request failed: {e}"), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = truncate(&body), "Inference API returned an error");
            return Err(PipelineError::transform(
                codes::INFERENCE_API_ERROR,
                format!("Inference API error ({status}): {}", truncate(&body)),
            ));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse inference response");
            api_error(format!("Failed to parse inference response: {e}"), e)
        })?;

        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Inference response received");

        interpret_response(parsed).map_err(|e| {
            warn!(code = e.code(), error = %e, "Inference produced no caption");
            e
        })
    }
}

// Stands in for the client when the inference settings failed to load.
#[async_trait]
impl InferenceBackend for ConfigFault {
    async fn describe(&self, _image: &[u8], _content_type: &str, _prompt: &str) -> Result<String> {
        Err(self.to_error())
    }
}
