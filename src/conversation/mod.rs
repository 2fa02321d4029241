
pub mod memory;
pub mod prompt;

pub use memory::MemoryStrategy;
pub use prompt::{build_prompt, build_system_prompt};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::config::{Config, ConfigError, VectorDbConfig};
use crate::database::lancedb::{SearchResult, VectorStore};
use crate::database::sqlite::models::Notebook;
use crate::embeddings::Embedder;
use crate::llm::{LlmProvider, Prompt};
use crate::{NotebookError, Result};

pub const NO_RESULTS_REPLY: &str =
    "I couldn't find any relevant information in this notebook to answer your question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Assistant => write!(f, "Assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    #[inline]
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A generated reply and the chunks it was grounded on
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchResult>,
    /// The history after the memory strategy ran, followed by this exchange.
    /// Callers keep this instead of their own copy so summaries replace older turns.
    pub history: Vec<Turn>,
}

impl Answer {
    /// Distinct source file names, in retrieval order
    #[inline]
    pub fn source_names(&self) -> Vec<&str> {
        self.sources
            .iter()
            .map(|source| source.chunk_metadata.source.as_str())
            .unique()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalOptions {
    pub n_results: usize,
    pub threshold: f32,
}

impl RetrievalOptions {
    #[inline]
    pub fn from_config(config: &VectorDbConfig) -> Self {
        Self {
            n_results: config.n_results,
            threshold: config.threshold,
        }
    }

    #[inline]
    pub fn with_overrides(
        self,
        n_results: Option<usize>,
        threshold: Option<f32>,
    ) -> std::result::Result<Self, ConfigError> {
        let merged = VectorDbConfig {
            n_results: n_results.unwrap_or(self.n_results),
            threshold: threshold.unwrap_or(self.threshold),
        };
        merged.validate()?;
        Ok(Self::from_config(&merged))
    }
}

/// Answers questions about one notebook with retrieved chunks and an LLM
pub struct ConversationManager<'a> {
    store: &'a VectorStore,
    embedder: &'a dyn Embedder,
    provider: &'a dyn LlmProvider,
    config: &'a Config,
    model: String,
    retrieval: RetrievalOptions,
    memory: MemoryStrategy,
}

impl<'a> ConversationManager<'a> {
    #[inline]
    pub fn new<S: Into<String>>(
        store: &'a VectorStore,
        embedder: &'a dyn Embedder,
        provider: &'a dyn LlmProvider,
        config: &'a Config,
        model: S,
    ) -> Self {
        Self {
            store,
            embedder,
            provider,
            config,
            model: model.into(),
            retrieval: RetrievalOptions::from_config(&config.app.vectordb),
            memory: MemoryStrategy::from_config(&config.app.memory_strategies),
        }
    }

    #[inline]
    pub fn with_retrieval(mut self, retrieval: RetrievalOptions) -> Self {
        self.retrieval = retrieval;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub async fn retrieve(&self, notebook: &Notebook, query: &str) -> Result<Vec<SearchResult>> {
        self.store
            .query_text(
                self.embedder,
                &notebook.collection_name(),
                query,
                self.retrieval.n_results,
                self.retrieval.threshold,
            )
            .await
    }

    /// Answer `query` from the notebook's documents, taking `history` into account.
    /// Nothing retrieved means a fixed reply without contacting the provider.
    #[inline]
    pub async fn respond(
        &self,
        notebook: &Notebook,
        query: &str,
        history: &[Turn],
    ) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(NotebookError::Validation(
                "Question cannot be empty".to_string(),
            ));
        }

        let sources = self.retrieve(notebook, query).await?;
        if sources.is_empty() {
            info!(
                "No chunks above threshold {} in '{}'",
                self.retrieval.threshold, notebook.name
            );
            return Ok(Answer {
                text: NO_RESULTS_REPLY.to_string(),
                sources,
                history: with_exchange(history.to_vec(), query, NO_RESULTS_REPLY),
            });
        }
        debug!("Retrieved {} chunks for query", sources.len());

        let history = self.bound_history(history)?;
        let input = format_input(&history, &sources, query);
        let user = build_prompt(
            "rag_assistant_prompt",
            &self.config.prompts.rag_assistant_prompt,
            &input,
            &self.config.app.reasoning_strategies,
        )?;
        let prompt = Prompt::new(user).with_system(self.system_prompt(notebook)?);

        let text = self.provider.generate(&prompt, &self.model)?;
        info!(
            "Answered with {} using {} sources",
            self.model,
            sources.len()
        );
        let history = with_exchange(history, query, &text);
        Ok(Answer {
            text,
            sources,
            history,
        })
    }

    #[inline]
    pub fn system_prompt(&self, notebook: &Notebook) -> Result<String> {
        Ok(build_system_prompt(
            "ai_assistant_system_prompt_advanced",
            &self.config.prompts.ai_assistant_system_prompt_advanced,
            &format!("You are assisting with the notebook '{}'.", notebook.name),
        )?)
    }

    /// Apply the configured memory strategy
    #[inline]
    pub fn bound_history(&self, history: &[Turn]) -> Result<Vec<Turn>> {
        self.memory
            .apply(history, |older| self.summarize(older))
    }

    fn summarize(&self, turns: &[Turn]) -> Result<String> {
        let user = build_prompt(
            "summarization_prompt",
            &self.config.prompts.summarization_prompt,
            &format_transcript(turns),
            &self.config.app.reasoning_strategies,
        )?;
        Ok(self.provider.generate(&Prompt::new(user), &self.model)?)
    }
}

fn with_exchange(mut history: Vec<Turn>, question: &str, reply: &str) -> Vec<Turn> {
    history.push(Turn::user(question));
    history.push(Turn::assistant(reply));
    history
}

fn format_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content.trim()))
        .join("\n")
}

fn format_input(history: &[Turn], sources: &[SearchResult], query: &str) -> String {
    let mut sections = Vec::with_capacity(3);

    if !history.is_empty() {
        sections.push(format!(
            "Conversation so far:\n\n{}",
            format_transcript(history)
        ));
    }

    let documents = sources
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[{}] (source: {})\n{}",
                i + 1,
                result.chunk_metadata.source,
                result.chunk_metadata.content.trim()
            )
        })
        .join("\n\n");
    sections.push(format!("Relevant documents:\n\n{documents}"));
    sections.push(format!("User's question:\n\n{query}"));

    sections.join("\n\n")
}
