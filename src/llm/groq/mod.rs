
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, DEFAULT_TIMEOUT_SECONDS, LlmProvider, Prompt, ProviderError};
use crate::config::ProviderConfig;
use crate::config::settings::{DEFAULT_GROQ_API_KEY_ENV, DEFAULT_GROQ_BASE_URL};

/// Groq's OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct GroqProvider {
    base_url: String,
    api_key: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl GroqProvider {
    #[inline]
    pub fn new<S: Into<String>, K: Into<String>>(base_url: S, api_key: K) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            agent: super::build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
        }
    }

    /// Reads the API key from the environment variable named in the provider config
    #[inline]
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let key_var = config
            .api_key_env
            .as_deref()
            .unwrap_or(DEFAULT_GROQ_API_KEY_ENV);
        let api_key = std::env::var(key_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey(key_var.to_string()))?;
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_GROQ_BASE_URL);

        Ok(Self::new(base_url, api_key))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl LlmProvider for GroqProvider {
    #[inline]
    fn name(&self) -> &str {
        super::GROQ
    }

    #[inline]
    fn generate(&self, prompt: &Prompt, model: &str) -> Result<String, ProviderError> {
        let request = CompletionRequest {
            model,
            messages: prompt.messages(),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!("Requesting completion from Groq model {}", model);
        let text = super::post_json(
            &self.agent,
            &self.completions_url(),
            Some(&self.api_key),
            &body,
        )?;

        let response: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("{e}: {text}")))?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("response has no choices".to_string()))
    }
}
