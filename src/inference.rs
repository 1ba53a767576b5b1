//! Inference service: turn a stored résumé plus instructions into raw
//! model output.
//!
//! The pipeline depends only on [`InferenceService`]. [`VisionInference`]
//! is the production implementation: it reads the résumé from the blob
//! store, rasterises page one, and sends the image with the instructions
//! to a vision LLM through `edgequake-llm`.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors are transient and common. Failed calls are retried
//! with exponential backoff (`retry_backoff_ms * 2^attempt`): with a 500 ms
//! base and 3 retries the waits are 500 ms → 1 s → 2 s. Every attempt is
//! bounded by `api_timeout_secs`.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ServiceError};
use crate::pipeline::encode::{encode_png, to_image_data};
use crate::pipeline::render::PdfRasterizer;
use crate::store::BlobStore;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Raw model output: `{ message: { content: string | [{ text }] } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub message: InferenceMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceMessage {
    pub content: MessageContent,
}

/// Providers answer either with a plain string or a list of content parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    pub text: String,
}

impl InferenceResponse {
    /// A response whose content is a plain string.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: InferenceMessage {
                content: MessageContent::Text(content.into()),
            },
        }
    }

    /// A response whose content is a list of parts.
    pub fn parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            message: InferenceMessage {
                content: MessageContent::Parts(
                    parts
                        .into_iter()
                        .map(|t| ContentPart { text: t.into() })
                        .collect(),
                ),
            },
        }
    }

    /// The string carrying the answer: the plain content, or the first
    /// part's `text`. `None` for an empty part list.
    pub fn content_text(&self) -> Option<&str> {
        match &self.message.content {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(parts) => parts.first().map(|p| p.text.as_str()),
        }
    }
}

/// Accepts a document reference plus a prompt and returns model output.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// `Ok(None)` means the service produced no response.
    async fn feedback(
        &self,
        document_path: &str,
        prompt: &str,
    ) -> Result<Option<InferenceResponse>, ServiceError>;
}

/// [`InferenceService`] backed by a vision LLM.
pub struct VisionInference {
    provider: Arc<dyn LLMProvider>,
    blobs: Arc<dyn BlobStore>,
    rasterizer: Arc<dyn PdfRasterizer>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
}

impl VisionInference {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        blobs: Arc<dyn BlobStore>,
        rasterizer: Arc<dyn PdfRasterizer>,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            provider,
            blobs,
            rasterizer,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }
}

#[async_trait]
impl InferenceService for VisionInference {
    async fn feedback(
        &self,
        document_path: &str,
        prompt: &str,
    ) -> Result<Option<InferenceResponse>, ServiceError> {
        let pdf = self
            .blobs
            .read(document_path)
            .await?
            .ok_or_else(|| ServiceError::NotFound(document_path.to_string()))?;
        let page = self
            .rasterizer
            .first_page(&pdf)
            .await?
            .ok_or_else(|| ServiceError::Backend("document has no pages".into()))?;
        let png = encode_png(&page)
            .map_err(|e| ServiceError::Backend(format!("image encoding failed: {e}")))?;

        let messages = vec![ChatMessage::user_with_images(
            prompt,
            vec![to_image_data(&png)],
        )];

        let start = Instant::now();
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_delay_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    document_path, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(
                self.api_timeout,
                self.provider.chat(&messages, Some(&self.options)),
            )
            .await
            {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        document_path,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    if response.content.trim().is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(InferenceResponse::text(response.content)));
                }
                Ok(Err(e)) => {
                    let err_msg = format!("{}", e);
                    warn!("{}: attempt {} failed: {}", document_path, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
                Err(_) => {
                    let err_msg = format!("timed out after {}s", self.api_timeout.as_secs());
                    warn!("{}: attempt {} {}", document_path, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(ServiceError::Backend(format!(
            "model call failed after {} retries: {}",
            self.max_retries,
            last_err.unwrap_or_else(|| "Unknown error".to_string())
        )))
    }
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Upper bound on a single retry pause.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Pause before retry `attempt` (1-based): `base_ms * 2^(attempt - 1)`,
/// capped at [`MAX_BACKOFF_MS`].
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| base_ms.checked_mul(factor))
        .map_or(MAX_BACKOFF_MS, |ms| ms.min(MAX_BACKOFF_MS))
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalysisError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    info!("Auto-detected LLM provider from environment");
    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalysisError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
