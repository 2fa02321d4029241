
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::prompts::PromptConfig;
use crate::embeddings::chunking::ChunkingConfig;

pub const APP_CONFIG_FILE: &str = "config.yaml";
pub const PROMPT_CONFIG_FILE: &str = "prompt_config.yaml";
pub const HOME_ENV_VAR: &str = "NOTEBOOK_RAG_HOME";
pub const DEFAULT_GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Runtime configuration: both YAML files plus the directory they were loaded from
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub app: AppConfig,
    pub prompts: PromptConfig,
    pub base_dir: PathBuf,
}

/// Contents of `config.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub providers: BTreeMap<String, ProviderConfig>,
    pub vectordb: VectorDbConfig,
    pub memory_strategies: MemoryConfig,
    pub reasoning_strategies: BTreeMap<String, String>,
    pub chunking: ChunkingConfig,
    pub embeddings: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ProviderConfig {
    pub models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Minimum cosine similarity a retrieved chunk must reach
    pub threshold: f32,
    pub n_results: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStrategyKind {
    #[default]
    Trimming,
    Summarization,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    pub strategy: MemoryStrategyKind,
    pub trimming_window_size: usize,
    pub summarization_max_tokens: usize,
    pub summarization_keep_recent: usize,
}

/// Ollama server used for computing embeddings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub host: String,
    pub model: String,
    pub batch_size: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
        }
    }
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            n_results: 5,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            strategy: MemoryStrategyKind::Trimming,
            trimming_window_size: 6,
            summarization_max_tokens: 2000,
            summarization_keep_recent: 4,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OLLAMA_HOST.to_string(),
            model: "all-minilm:latest".to_string(),
            batch_size: 16,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            "groq".to_string(),
            ProviderConfig {
                models: vec![
                    "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
                    "llama-3.3-70b-versatile".to_string(),
                    "llama-3.1-8b-instant".to_string(),
                ],
                host: None,
                base_url: Some(DEFAULT_GROQ_BASE_URL.to_string()),
                api_key_env: Some(DEFAULT_GROQ_API_KEY_ENV.to_string()),
            },
        );
        providers.insert(
            "ollama".to_string(),
            ProviderConfig {
                models: vec!["llama3.2".to_string(), "qwen2.5:7b".to_string()],
                host: Some(DEFAULT_OLLAMA_HOST.to_string()),
                base_url: None,
                api_key_env: None,
            },
        );

        Self {
            llm: LlmConfig::default(),
            providers,
            vectordb: VectorDbConfig::default(),
            memory_strategies: MemoryConfig::default(),
            reasoning_strategies: default_reasoning_strategies(),
            chunking: ChunkingConfig::default(),
            embeddings: EmbeddingConfig::default(),
        }
    }
}

fn default_reasoning_strategies() -> BTreeMap<String, String> {
    let mut strategies = BTreeMap::new();
    strategies.insert(
        "CoT".to_string(),
        "Use this approach:\n\
         - Think through the question step by step before answering.\n\
         - Work through the relevant documents one at a time.\n\
         - Briefly show your reasoning, then state the final answer."
            .to_string(),
    );
    strategies.insert(
        "ReAct".to_string(),
        "Use the ReAct pattern:\n\
         - Thought: reason about what the question needs.\n\
         - Action: look up the passages in the provided documents that address it.\n\
         - Observation: note what those passages say.\n\
         - Repeat as needed, then give a Final Answer."
            .to_string(),
    );
    strategies.insert(
        "Self-Ask".to_string(),
        "Use the Self-Ask approach:\n\
         - Break the question into smaller follow-up questions.\n\
         - Answer each follow-up question from the documents.\n\
         - Combine those answers into the final answer."
            .to_string(),
    );
    strategies
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid similarity threshold: {0} (must be between 0 and 1)")]
    InvalidThreshold(f32),
    #[error("Invalid result count: {0} (must be at least 1)")]
    InvalidResultCount(usize),
    #[error("Invalid trimming window size: {0} (must be at least 1)")]
    InvalidWindowSize(usize),
    #[error("Invalid summarization token limit: {0} (must be at least 1)")]
    InvalidMaxTokens(usize),
    #[error("Invalid chunk size: {0} (must be at least 1)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0}")]
    InvalidModel(String),
    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),
    #[error("Unknown reasoning strategy: {0}")]
    UnknownReasoningStrategy(String),
    #[error("Prompt '{prompt}' is missing required field '{field}'")]
    MissingPromptField {
        prompt: &'static str,
        field: &'static str,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Config {
    /// Load both configuration files from `<base_dir>/config`, falling back to defaults
    /// for any file that does not exist yet
    #[inline]
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_dir = base_dir.join("config");

        let app: AppConfig = load_yaml_or_default(&config_dir.join(APP_CONFIG_FILE))?;
        let prompts: PromptConfig = load_yaml_or_default(&config_dir.join(PROMPT_CONFIG_FILE))?;

        let config = Self {
            app,
            prompts,
            base_dir,
        };

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Load from the default base directory
    #[inline]
    pub fn load_default() -> Result<Self> {
        let base_dir = Self::default_base_dir()?;
        Self::load(base_dir)
    }

    /// Defaults rooted at `base_dir`, without touching the filesystem
    #[inline]
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            app: AppConfig::default(),
            prompts: PromptConfig::default(),
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// `$NOTEBOOK_RAG_HOME`, otherwise `<platform data dir>/notebook-rag`
    #[inline]
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        if let Ok(home) = std::env::var(HOME_ENV_VAR) {
            if !home.trim().is_empty() {
                return Ok(PathBuf::from(home));
            }
        }

        dirs::data_dir()
            .map(|dir| dir.join("notebook-rag"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.config_dir();
        fs::create_dir_all(&config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        save_yaml(&self.app_config_path(), &self.app)?;
        save_yaml(&self.prompt_config_path(), &self.prompts)?;

        Ok(())
    }

    /// Load `<base_dir>/.env` into the process environment, overriding existing values
    #[inline]
    pub fn load_env(&self) -> Result<bool> {
        let env_path = self.env_path();
        if !env_path.exists() {
            debug!("No .env file at {}", env_path.display());
            return Ok(false);
        }

        dotenvy::from_path_override(&env_path)
            .with_context(|| format!("Failed to load env file: {}", env_path.display()))?;
        debug!("Loaded environment from {}", env_path.display());
        Ok(true)
    }

    /// Create the config, data and vector directories
    #[inline]
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.config_dir(), self.data_dir(), self.vector_db_path()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.app.validate()?;
        self.prompts.validate(&self.app.reasoning_strategies)?;
        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    #[inline]
    pub fn app_config_path(&self) -> PathBuf {
        self.config_dir().join(APP_CONFIG_FILE)
    }

    #[inline]
    pub fn prompt_config_path(&self) -> PathBuf {
        self.config_dir().join(PROMPT_CONFIG_FILE)
    }

    #[inline]
    pub fn env_path(&self) -> PathBuf {
        self.base_dir.join(".env")
    }

    /// Get the path for the SQLite database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("notebooks.db")
    }

    /// Root of the per-notebook upload directories
    #[inline]
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the path for the vector database directory
    #[inline]
    pub fn vector_db_path(&self) -> PathBuf {
        self.base_dir.join("vector_db")
    }
}

impl AppConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vectordb.validate()?;
        self.memory_strategies.validate()?;
        self.chunking.validate()?;
        self.embeddings.validate()?;

        if !self.providers.contains_key(&self.llm.provider) {
            return Err(ConfigError::UnknownProvider(self.llm.provider.clone()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.llm.model.clone()));
        }

        for provider in self.providers.values() {
            provider.validate()?;
        }

        Ok(())
    }

    #[inline]
    pub fn provider(&self, name: &str) -> Result<&ProviderConfig, ConfigError> {
        self.providers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProvider(name.to_string()))
    }

    /// Change the active provider and model, rejecting models the provider does not list
    #[inline]
    pub fn select_llm(&mut self, provider: &str, model: &str) -> Result<(), ConfigError> {
        self.provider(provider)?.check_model(model)?;
        self.llm.provider = provider.to_string();
        self.llm.model = model.to_string();
        Ok(())
    }

    #[inline]
    pub fn reasoning_strategy(&self, key: &str) -> Option<&str> {
        self.reasoning_strategies.get(key).map(String::as_str)
    }
}

impl ProviderConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [&self.host, &self.base_url].into_iter().flatten() {
            Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
        }
        Ok(())
    }

    /// An empty model list accepts any model name
    #[inline]
    pub fn check_model(&self, model: &str) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model.to_string()));
        }
        if !self.models.is_empty() && !self.models.iter().any(|m| m == model) {
            return Err(ConfigError::InvalidModel(format!(
                "{} (available: {})",
                model,
                self.models.join(", ")
            )));
        }
        Ok(())
    }
}

impl VectorDbConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.n_results == 0 {
            return Err(ConfigError::InvalidResultCount(self.n_results));
        }
        Ok(())
    }
}

impl MemoryConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trimming_window_size == 0 {
            return Err(ConfigError::InvalidWindowSize(self.trimming_window_size));
        }
        if self.summarization_max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(
                self.summarization_max_tokens,
            ));
        }
        Ok(())
    }
}

impl EmbeddingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.host_url()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        Ok(())
    }

    #[inline]
    pub fn host_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.host).map_err(|_| ConfigError::InvalidUrl(self.host.clone()))
    }
}

fn load_yaml_or_default<T>(path: &Path) -> Result<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        debug!("{} not found, using defaults", path.display());
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    // An empty file parses as YAML null
    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn save_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_yaml::to_string(value).context("Failed to serialize config to YAML")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}
