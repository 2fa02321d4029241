
use tracing::debug;

use super::{Role, Turn};
use crate::config::{MemoryConfig, MemoryStrategyKind};
use crate::embeddings::estimate_token_count;

const SUMMARY_PREFIX: &str = "Summary of the earlier conversation:";

/// How conversation history is bounded before it is sent to a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStrategy {
    Trimming { window_size: usize },
    Summarization { max_tokens: usize, keep_recent: usize },
}

impl MemoryStrategy {
    #[inline]
    pub fn from_config(config: &MemoryConfig) -> Self {
        match config.strategy {
            MemoryStrategyKind::Trimming => Self::Trimming {
                window_size: config.trimming_window_size,
            },
            MemoryStrategyKind::Summarization => Self::Summarization {
                max_tokens: config.summarization_max_tokens,
                keep_recent: config.summarization_keep_recent,
            },
        }
    }

    /// `summarize` is only called by the summarization strategy, with the turns being replaced
    #[inline]
    pub fn apply<F, E>(&self, turns: &[Turn], summarize: F) -> Result<Vec<Turn>, E>
    where
        F: FnOnce(&[Turn]) -> Result<String, E>,
    {
        match *self {
            Self::Trimming { window_size } => Ok(trim_history(turns, window_size)),
            Self::Summarization {
                max_tokens,
                keep_recent,
            } => summarize_history(turns, max_tokens, keep_recent, summarize),
        }
    }
}

/// Keep the last `window_size` turns
#[inline]
pub fn trim_history(turns: &[Turn], window_size: usize) -> Vec<Turn> {
    let start = turns.len().saturating_sub(window_size);
    turns[start..].to_vec()
}

#[inline]
pub fn history_token_count(turns: &[Turn]) -> usize {
    turns
        .iter()
        .map(|turn| estimate_token_count(&turn.content))
        .sum()
}

/// Replace everything but the last `keep_recent` turns with a single summary turn once the
/// history grows past `max_tokens`
#[inline]
pub fn summarize_history<F, E>(
    turns: &[Turn],
    max_tokens: usize,
    keep_recent: usize,
    summarize: F,
) -> Result<Vec<Turn>, E>
where
    F: FnOnce(&[Turn]) -> Result<String, E>,
{
    let tokens = history_token_count(turns);
    if tokens <= max_tokens || turns.len() <= keep_recent {
        return Ok(turns.to_vec());
    }

    let split = turns.len() - keep_recent;
    let (older, recent) = turns.split_at(split);
    debug!(
        "History is ~{} tokens (limit {}), summarizing {} older turns",
        tokens,
        max_tokens,
        older.len()
    );

    let summary = summarize(older)?;
    let mut compacted = Vec::with_capacity(recent.len() + 1);
    compacted.push(Turn::new(
        Role::Assistant,
        format!("{} {}", SUMMARY_PREFIX, summary.trim()),
    ));
    compacted.extend_from_slice(recent);
    Ok(compacted)
}
