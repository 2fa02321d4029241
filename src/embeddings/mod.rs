pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, TextChunk, chunk_text, estimate_token_count};
pub use ollama::OllamaClient;

/// Computes vectors for text. Implementations must return one vector per input, in order.
pub trait Embedder: Send + Sync {
    /// Name of the embedding model, for logging
    fn model(&self) -> &str;

    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Embedding model returned no vector"))
    }
}
