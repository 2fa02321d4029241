// LanceDB vector database module
// One table ("collection") per notebook holding that notebook's chunk embeddings

#[cfg(test)]
mod tests;

pub mod vector_store;

pub use vector_store::{CollectionRemoval, SearchResult, VectorStore};

use serde::{Deserialize, Serialize};

use crate::database::sqlite::models::FileRecord;
use crate::embeddings::chunking::TextChunk;

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Deterministic identifier, `<file_id>:<chunk_index>`
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub notebook_id: i64,
    pub file_id: i64,
    /// Original filename of the document the chunk came from
    pub source: String,
    pub chunk_index: u32,
    /// Character offset of the chunk within the extracted text
    pub char_offset: u32,
    pub content: String,
    /// RFC 3339 timestamp
    pub created_at: String,
}

impl EmbeddingRecord {
    #[inline]
    pub fn record_id(file_id: i64, chunk_index: usize) -> String {
        format!("{file_id}:{chunk_index}")
    }

    /// Pair a chunk of `file` with its computed vector
    #[inline]
    pub fn from_chunk(
        notebook_id: i64,
        file: &FileRecord,
        chunk: &TextChunk,
        vector: Vec<f32>,
        created_at: &str,
    ) -> Self {
        Self {
            id: Self::record_id(file.id, chunk.chunk_index),
            vector,
            metadata: ChunkMetadata {
                notebook_id,
                file_id: file.id,
                source: file.original_filename.clone(),
                chunk_index: u32::try_from(chunk.chunk_index).unwrap_or(u32::MAX),
                char_offset: u32::try_from(chunk.char_offset).unwrap_or(u32::MAX),
                content: chunk.content.clone(),
                created_at: created_at.to_string(),
            },
        }
    }
}
