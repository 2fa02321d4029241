#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::config::ConfigError;

/// Separators tried in order; `""` falls back to single characters
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A chunk of extracted text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The trimmed chunk text
    pub content: String,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    /// Character offset of the chunk in the source text
    pub char_offset: usize,
}

/// Sizes are measured in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        Ok(())
    }
}

/// Split text recursively on paragraph, line, word and character boundaries, then
/// greedily merge the pieces into chunks of at most `chunk_size` characters, carrying
/// up to `chunk_overlap` characters between neighbours.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>, ConfigError> {
    config.validate()?;

    let splitter = RecursiveSplitter {
        chunk_size: config.chunk_size,
        chunk_overlap: config.chunk_overlap,
    };

    let pieces: Vec<String> = splitter
        .split(text, &DEFAULT_SEPARATORS)
        .into_iter()
        .filter_map(|piece| {
            let trimmed = piece.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect();

    let chunks = locate_chunks(text, pieces, config.chunk_overlap);

    debug!(
        "Split {} characters into {} chunks (size {}, overlap {})",
        text.chars().count(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    Ok(chunks)
}

struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut final_chunks = Vec::new();
        let (separator, remaining) = pick_separator(text, separators);

        let mut good_splits: Vec<&str> = Vec::new();
        for piece in split_keep_start(text, separator) {
            if char_len(piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                final_chunks.push(piece.to_string());
            } else {
                final_chunks.extend(self.split(piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge(&good_splits));
        }

        final_chunks
    }

    fn merge(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &split in splits {
            let len = char_len(split);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current) {
                        docs.push(doc);
                    }

                    // Drop leading pieces until what remains fits the overlap and leaves
                    // room for the next piece
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        let Some(first) = current.pop_front() else {
                            break;
                        };
                        total -= char_len(first);
                    }
                }
            }

            current.push_back(split);
            total += len;
        }

        if let Some(doc) = join_pieces(&current) {
            docs.push(doc);
        }

        docs
    }
}

/// First separator present in `text`, plus the finer separators left for recursion
fn pick_separator<'s>(text: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (i, &separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (separator, &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[i + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

/// Split on `separator`, keeping it at the start of the following piece. Empty
/// pieces are dropped.
#[expect(
    clippy::string_slice,
    reason = "boundaries come from match_indices and are char-aligned"
)]
fn split_keep_start<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_pieces(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Find each chunk in the source, starting the search where the previous chunk's
/// overlap would begin. The cursor only moves forward, so characters are counted
/// once per span rather than from the start of the text.
#[expect(clippy::string_slice, reason = "byte offsets come from char_indices and find")]
fn locate_chunks(text: &str, pieces: Vec<String>, overlap: usize) -> Vec<TextChunk> {
    let mut chunks = Vec::with_capacity(pieces.len());
    // Byte and char position of the previous chunk's start
    let mut anchor_byte: usize = 0;
    let mut anchor_char: usize = 0;
    let mut previous_len: usize = 0;

    for (chunk_index, content) in pieces.into_iter().enumerate() {
        let skip = previous_len.saturating_sub(overlap);
        let search_byte = text[anchor_byte..]
            .char_indices()
            .nth(skip)
            .map_or(text.len(), |(i, _)| anchor_byte + i);
        let search_char = anchor_char + skip;

        let (byte_offset, char_offset) = match text[search_byte..].find(&content) {
            Some(pos) => (
                search_byte + pos,
                search_char + char_len(&text[search_byte..search_byte + pos]),
            ),
            None => match text.find(&content) {
                Some(pos) => (pos, char_len(&text[..pos])),
                None => (anchor_byte, anchor_char),
            },
        };

        anchor_byte = byte_offset;
        anchor_char = char_offset;
        previous_len = char_len(&content);
        chunks.push(TextChunk {
            content,
            chunk_index,
            char_offset,
        });
    }

    chunks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
