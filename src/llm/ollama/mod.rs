
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, DEFAULT_TIMEOUT_SECONDS, LlmProvider, Prompt, ProviderError};
use crate::config::ProviderConfig;
use crate::config::settings::DEFAULT_OLLAMA_HOST;

/// Local chat completions through Ollama's `/api/chat`
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    host: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaProvider {
    #[inline]
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            agent: super::build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
        }
    }

    #[inline]
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self::new(
            config.host.as_deref().unwrap_or(DEFAULT_OLLAMA_HOST),
        ))
    }
}

impl LlmProvider for OllamaProvider {
    #[inline]
    fn name(&self) -> &str {
        super::OLLAMA
    }

    #[inline]
    fn generate(&self, prompt: &Prompt, model: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model,
            messages: prompt.messages(),
            stream: false,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        debug!("Requesting chat completion from Ollama model {}", model);
        let text = super::post_json(&self.agent, &format!("{}/api/chat", self.host), None, &body)?;

        let response: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("{e}: {text}")))?;
        Ok(response.message.content)
    }
}
