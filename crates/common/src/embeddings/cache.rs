//! In-process cache for query embeddings
//!
//! Retrieval embeds the same short user queries over and over; caching the
//! vectors turns a network round-trip into a map lookup. Entries expire
//! after a fixed time window and are evicted in least-recently-used order
//! once the cache is full.
//!
//! Concurrency contract: a hit never recomputes; a miss computes once per
//! key under light contention. Concurrent misses on the same key may both
//! compute, with last-writer-wins semantics (no single-flight requirement
//! for a read-mostly, expiring cache).

use crate::config::CacheConfig;
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use super::Embedder;

struct CacheEntry {
    embedding: Vec<f32>,
    stored_at: Instant,
}

struct CacheInner {
    map: HashMap<String, CacheEntry>,
    access_order: Vec<String>,
}

/// LRU + TTL cache for query embeddings.
///
/// Keys are normalized (lowercased, trimmed) query strings, so casing and
/// surrounding whitespace variations share one entry.
pub struct EmbeddingCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
    ttl: Duration,
}

impl EmbeddingCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::with_capacity(config.max_entries),
                access_order: Vec::with_capacity(config.max_entries),
            }),
            max_entries: config.max_entries,
            ttl: Duration::from_secs(config.ttl_secs),
        }
    }

    /// Cache key for a query string.
    pub fn normalize_key(query: &str) -> String {
        query.trim().to_lowercase()
    }

    /// Look up the embedding for a query. Expired entries are dropped on
    /// access and reported as misses.
    pub fn get(&self, query: &str) -> Option<Vec<f32>> {
        let key = Self::normalize_key(query);
        let mut inner = self.inner.lock().expect("embedding cache poisoned");

        let expired = match inner.map.get(&key) {
            Some(entry) => entry.stored_at.elapsed() >= self.ttl,
            None => return None,
        };

        if expired {
            inner.map.remove(&key);
            if let Some(idx) = inner.access_order.iter().position(|k| k == &key) {
                inner.access_order.remove(idx);
            }
            debug!(key = %key, "embedding cache entry expired");
            return None;
        }

        // Mark as recently used (move to end of LRU list)
        if let Some(idx) = inner.access_order.iter().position(|k| k == &key) {
            let k = inner.access_order.remove(idx);
            inner.access_order.push(k);
        }

        inner.map.get(&key).map(|e| e.embedding.clone())
    }

    /// Store the embedding for a query, evicting the least-recently-used
    /// entry when the cache is full.
    pub fn insert(&self, query: &str, embedding: Vec<f32>) {
        let key = Self::normalize_key(query);
        let mut inner = self.inner.lock().expect("embedding cache poisoned");

        if !inner.map.contains_key(&key) && inner.map.len() >= self.max_entries {
            if let Some(evicted) = inner.access_order.first().cloned() {
                inner.map.remove(&evicted);
                inner.access_order.remove(0);
                debug!(key = %evicted, "embedding cache entry evicted");
            }
        }

        if let Some(idx) = inner.access_order.iter().position(|k| k == &key) {
            inner.access_order.remove(idx);
        }
        inner.access_order.push(key.clone());
        inner.map.insert(
            key,
            CacheEntry {
                embedding,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("embedding cache poisoned").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An [`Embedder`] wrapper that caches single-text (query-side) embeddings.
///
/// Batch calls bypass the cache: document chunks are embedded once at
/// ingestion and never looked up again.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: EmbeddingCache,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, config: &CacheConfig) -> Self {
        Self {
            inner,
            cache: EmbeddingCache::new(config),
        }
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.get(text) {
            debug!(query = %text, "embedding cache hit");
            return Ok(hit);
        }

        debug!(query = %text, "embedding cache miss");
        let embedding = self.inner.embed(text).await?;
        self.cache.insert(text, embedding.clone());
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.inner.embed_batch(texts).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
