
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::EmbeddingConfig;
use crate::embeddings::Embedder;
use crate::retry::Backoff;

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Embedding client for a local Ollama server (`/api/embed`)
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
    backoff: Backoff,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .host_url()
            .context("Failed to parse Ollama URL from config")?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            agent: ureq::Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
                .build()
                .into(),
            backoff: Backoff::new(DEFAULT_RETRY_ATTEMPTS, Duration::from_secs(1)),
        })
    }

    /// Base delay before the first retry; later retries back off exponentially
    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.backoff.base_delay = delay;
        self
    }

    /// Check that the server answers and has the configured model pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models().context("Server ping failed")?;
        if models.iter().any(|m| model_matches(&m.name, &self.model)) {
            info!(
                "Ollama at {} is serving embedding model {}",
                self.base_url, self.model
            );
            return Ok(());
        }

        let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!("Model {} not found. Available models: {:?}", self.model, available);
        Err(anyhow!(
            "Model '{}' is not available. Run `ollama pull {}`. Available models: {:?}",
            self.model,
            self.model,
            available
        ))
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        let text = self
            .backoff
            .retry_if(
                "Listing Ollama models",
                || {
                    self.agent
                        .get(url.as_str())
                        .call()
                        .and_then(|mut resp| resp.body_mut().read_to_string())
                },
                is_transient,
            )
            .map_err(|e| anyhow!("Failed to fetch models from {}: {}", url, e))?;

        let response: ModelsResponse =
            serde_json::from_str(&text).context("Failed to parse models response")?;
        debug!("Found {} models", response.models.len());
        Ok(response.models)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("/api/embed")
            .context("Failed to build embedding URL")?;
        let body = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: texts,
        })
        .context("Failed to serialize embedding request")?;

        let text = self
            .backoff
            .retry_if(
                "Embedding request",
                || {
                    self.agent
                        .post(url.as_str())
                        .header("Content-Type", "application/json")
                        .send(&body)
                        .and_then(|mut resp| resp.body_mut().read_to_string())
                },
                is_transient,
            )
            .map_err(|e| anyhow!("Embedding request to {} failed: {}", url, e))?;

        let response: EmbedResponse =
            serde_json::from_str(&text).context("Failed to parse embedding response")?;
        if response.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            ));
        }

        Ok(response.embeddings)
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            vectors.extend(
                self.embed_batch(batch)
                    .with_context(|| format!("Failed to embed batch of {} texts", batch.len()))?,
            );
        }
        debug!("Generated {} embeddings with {}", vectors.len(), self.model);
        Ok(vectors)
    }
}

/// Server errors and transport failures are worth retrying; 4xx responses are not
fn is_transient(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}

/// Ollama reports untagged models with an implicit `:latest`
fn model_matches(available: &str, wanted: &str) -> bool {
    available == wanted
        || available.strip_suffix(":latest") == Some(wanted)
        || wanted.strip_suffix(":latest") == Some(available)
}
