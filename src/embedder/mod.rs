//! Embedding and chat provider clients.

use anyhow::{anyhow, Result};

pub mod cache;
pub mod openai;

pub use cache::CachingEmbedder;

/// Blocking text-embedding provider.
///
/// Implementations are called from the blocking thread pool, so they are free
/// to perform synchronous network I/O.
pub trait Embedder: Send + Sync {
    /// Maximum number of inputs accepted by a single `embed_batch` call.
    fn batch_size(&self) -> usize;

    /// Embeds every input, returning vectors in input order.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single string.
    fn embed_one(&self, input: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[input])?
            .pop()
            .ok_or_else(|| anyhow!("embedding provider returned no vector"))
    }
}

/// Blocking chat provider used to rewrite queries before embedding.
pub trait Translator: Send + Sync {
    /// Returns `text` rendered in the translator's target language.
    fn translate(&self, text: &str) -> Result<String>;
}
