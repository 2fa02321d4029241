use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::ProviderError;

pub type Result<T> = std::result::Result<T, NotebookError>;

#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to process '{file}': {message}")]
    Processing { file: String, message: String },

    #[error("Storage is locked: {0}")]
    StorageLock(String),

    #[error("LLM provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod indexer;
pub mod llm;
pub mod notebooks;
pub mod retry;
pub mod storage;
