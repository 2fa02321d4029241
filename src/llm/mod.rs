
pub mod groq;
pub mod ollama;

pub use groq::GroqProvider;
pub use ollama::OllamaProvider;

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::{AppConfig, ConfigError};

pub const GROQ: &str = "groq";
pub const OLLAMA: &str = "ollama";

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API key is not set; export {0} or add it to the .env file")]
    MissingApiKey(String),
    #[error("Provider is unavailable: {0}")]
    Unavailable(String),
    #[error("Provider rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// A single completion request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    #[inline]
    pub fn new<S: Into<String>>(user: S) -> Self {
        Self {
            system: None,
            user: user.into(),
        }
    }

    #[inline]
    pub fn with_system<S: Into<String>>(mut self, system: S) -> Self {
        self.system = Some(system.into());
        self
    }

    fn messages(&self) -> Vec<ChatMessage<'_>> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &self.user,
        });
        messages
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, prompt: &Prompt, model: &str) -> Result<String, ProviderError>;
}

/// Build the provider registered under `name`
#[inline]
pub fn create_provider(config: &AppConfig, name: &str) -> crate::Result<Box<dyn LlmProvider>> {
    let provider_config = config.provider(name)?;
    match name {
        GROQ => Ok(Box::new(GroqProvider::from_config(provider_config)?)),
        OLLAMA => Ok(Box::new(OllamaProvider::from_config(provider_config)?)),
        other => Err(ConfigError::UnknownProvider(other.to_string()).into()),
    }
}

/// Provider and model for one request, after applying command-line overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSelection {
    pub provider: String,
    pub model: String,
}

impl LlmSelection {
    /// Falls back to the configured provider and model. Switching provider without naming
    /// a model picks that provider's first listed model.
    #[inline]
    pub fn resolve(
        config: &AppConfig,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let provider = provider.unwrap_or(&config.llm.provider);
        let provider_config = config.provider(provider)?;

        let model = match model {
            Some(model) => model.to_string(),
            None if provider == config.llm.provider => config.llm.model.clone(),
            None => provider_config.models.first().cloned().ok_or_else(|| {
                ConfigError::InvalidModel(format!("no model given for provider '{provider}'"))
            })?,
        };
        provider_config.check_model(&model)?;

        Ok(Self {
            provider: provider.to_string(),
            model,
        })
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// POST a JSON body once. Non-2xx responses become `Rejected` with the response body.
fn post_json(
    agent: &ureq::Agent,
    url: &str,
    bearer: Option<&str>,
    body: &str,
) -> Result<String, ProviderError> {
    debug!("POST {}", url);

    let mut request = agent.post(url).header("Content-Type", "application/json");
    if let Some(key) = bearer {
        request = request.header("Authorization", format!("Bearer {key}"));
    }

    let mut response = request
        .send(body)
        .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

    if !(200..300).contains(&status) {
        return Err(ProviderError::Rejected { status, body: text });
    }
    Ok(text)
}
