//! LRU memo in front of an embedding provider.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use lru::LruCache;

use super::Embedder;

/// Serves repeated inputs from memory and forwards only misses.
///
/// Meant for query text; corpus loads go to the provider directly so they do
/// not flush recent queries out of the cache.
pub struct CachingEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachingEmbedder {
    /// Caches up to `capacity` embeddings produced by `inner`.
    pub fn new(inner: Arc<dyn Embedder>, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Wraps `inner` in a cache of `capacity` entries, or returns it as is
    /// when `capacity` is zero.
    pub fn wrap(inner: Arc<dyn Embedder>, capacity: usize) -> Arc<dyn Embedder> {
        match NonZeroUsize::new(capacity) {
            Some(capacity) => Arc::new(Self::new(inner, capacity)),
            None => inner,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<String, Vec<f32>>>> {
        self.cache
            .lock()
            .map_err(|_| anyhow!("embedding cache lock poisoned"))
    }
}

impl Embedder for CachingEmbedder {
    fn batch_size(&self) -> usize {
        self.inner.batch_size()
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors: Vec<Option<Vec<f32>>> = {
            let mut cache = self.lock()?;
            inputs.iter().map(|input| cache.get(*input).cloned()).collect()
        };
        let misses: Vec<&str> = inputs
            .iter()
            .zip(&vectors)
            .filter(|(_, hit)| hit.is_none())
            .map(|(input, _)| *input)
            .collect();
        if !misses.is_empty() {
            let fresh = self.inner.embed_batch(&misses)?;
            anyhow::ensure!(
                fresh.len() == misses.len(),
                "provider returned {} embeddings for {} inputs",
                fresh.len(),
                misses.len()
            );
            let mut fresh = fresh.into_iter();
            let mut cache = self.lock()?;
            for (input, slot) in inputs.iter().zip(vectors.iter_mut()) {
                if slot.is_some() {
                    continue;
                }
                if let Some(vector) = fresh.next() {
                    cache.put(input.to_string(), vector.clone());
                    *slot = Some(vector);
                }
            }
        }
        vectors
            .into_iter()
            .map(|vector| {
                vector.ok_or_else(|| anyhow!("embedding missing from provider reply"))
            })
            .collect()
    }
}
