//! Vector index abstraction
//!
//! The index is an external collaborator: it stores passages with their
//! embeddings and answers nearest-neighbor queries with a score threshold
//! and an optional source-document filter. The core never manages its
//! persistence or schema.
//!
//! Implementations:
//! - [`ChromaIndex`]: REST client for a Chroma server
//! - [`InMemoryIndex`]: cosine-similarity scan, for tests and local runs

use crate::config::IndexConfig;
use crate::embeddings::{cosine_similarity, Embedder};
use crate::errors::{AppError, Result};
use crate::models::{Passage, SearchHit};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Trait for vector index backends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store a batch of passages. All-or-nothing: on error nothing is
    /// considered written.
    async fn add(&self, passages: Vec<Passage>) -> Result<()>;

    /// Query by similarity to `text`.
    ///
    /// Returns at most `top_k` hits with score >= `threshold`, ranked by
    /// descending relevance. When `source_filter` is given, only passages
    /// whose source filename matches exactly are considered.
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        threshold: f32,
        source_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>>;
}

// ============ Chroma client ============

/// REST client for a Chroma vector store.
///
/// Embeds texts through the injected [`Embedder`] and maps Chroma's cosine
/// distance to a similarity score (`1 - distance`). The score threshold is
/// applied client-side.
pub struct ChromaIndex {
    client: reqwest::Client,
    base_url: String,
    collection_id: String,
    embedder: Arc<dyn Embedder>,
}

impl ChromaIndex {
    /// Connect to the server and get-or-create the configured collection.
    pub async fn connect(config: &IndexConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let url = format!("{}/api/v1/collections", config.url);
        let response = client
            .post(&url)
            .json(&json!({
                "name": config.collection,
                "get_or_create": true,
                "metadata": { "hnsw:space": "cosine" },
            }))
            .send()
            .await
            .map_err(|e| AppError::IndexUnavailable {
                message: format!("Failed to reach Chroma at {}: {}", config.url, e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::IndexUnavailable {
                message: format!("Collection setup failed ({}): {}", status, body),
            });
        }

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| AppError::IndexUnavailable {
                    message: format!("Invalid collection response: {}", e),
                })?;

        let collection_id = body
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| AppError::IndexUnavailable {
                message: "Collection response missing id".to_string(),
            })?
            .to_string();

        debug!(collection = %config.collection, id = %collection_id, "Chroma collection ready");

        Ok(Self {
            client,
            base_url: config.url.clone(),
            collection_id,
            embedder,
        })
    }
}

#[async_trait]
impl VectorIndex for ChromaIndex {
    async fn add(&self, passages: Vec<Passage>) -> Result<()> {
        if passages.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let ids: Vec<String> = passages.iter().map(|p| p.chunk_id.to_string()).collect();
        let metadatas: Vec<serde_json::Value> = passages
            .iter()
            .map(|p| {
                json!({
                    "source": p.source_filename,
                    "chunkId": p.chunk_id.to_string(),
                    "fileType": p.mime_type,
                    "contentHash": p.content_hash,
                })
            })
            .collect();

        let url = format!(
            "{}/api/v1/collections/{}/add",
            self.base_url, self.collection_id
        );
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "ids": ids,
                "embeddings": embeddings,
                "documents": texts,
                "metadatas": metadatas,
            }))
            .send()
            .await
            .map_err(|e| AppError::IndexUnavailable {
                message: format!("Add request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::IndexUnavailable {
                message: format!("Add failed ({}): {}", status, body),
            });
        }

        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
        threshold: f32,
        source_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let embedding = self.embedder.embed(text).await?;

        let mut request = json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(source) = source_filter {
            request["where"] = json!({ "source": source });
        }

        let url = format!(
            "{}/api/v1/collections/{}/query",
            self.base_url, self.collection_id
        );
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::IndexUnavailable {
                message: format!("Query request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::IndexUnavailable {
                message: format!("Query failed ({}): {}", status, body),
            });
        }

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| AppError::IndexUnavailable {
                    message: format!("Invalid query response: {}", e),
                })?;

        parse_query_response(&body, threshold)
    }
}

/// Turn Chroma's column-oriented query response into scored hits,
/// dropping everything below the similarity threshold.
fn parse_query_response(body: &serde_json::Value, threshold: f32) -> Result<Vec<SearchHit>> {
    let documents = first_batch(body, "documents");
    let metadatas = first_batch(body, "metadatas");
    let distances = first_batch(body, "distances");

    let (documents, distances) = match (documents, distances) {
        (Some(d), Some(dist)) => (d, dist),
        _ => return Ok(Vec::new()),
    };

    let mut hits = Vec::with_capacity(documents.len());
    for (i, doc) in documents.iter().enumerate() {
        let text = match doc.as_str() {
            Some(t) => t.to_string(),
            None => continue,
        };
        let distance = distances.get(i).and_then(|d| d.as_f64()).unwrap_or(1.0);
        let score = (1.0 - distance) as f32;
        if score < threshold {
            continue;
        }
        let source_filename = metadatas
            .and_then(|m| m.get(i))
            .and_then(|m| m.get("source"))
            .and_then(|s| s.as_str())
            .unwrap_or_default()
            .to_string();

        hits.push(SearchHit {
            text,
            source_filename,
            score,
        });
    }

    Ok(hits)
}

fn first_batch<'a>(body: &'a serde_json::Value, field: &str) -> Option<&'a Vec<serde_json::Value>> {
    body.get(field)?.as_array()?.first()?.as_array()
}

// ============ In-memory index ============

/// Cosine-similarity scan over an in-memory passage store.
///
/// Good enough for tests and small local corpora; not a substitute for a
/// real ANN index at scale.
pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<(Passage, Vec<f32>)>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored passages.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, passages: Vec<Passage>) -> Result<()> {
        if passages.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut entries = self.entries.write().await;
        entries.extend(passages.into_iter().zip(embeddings));
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
        threshold: f32,
        source_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let query_embedding = self.embedder.embed(text).await?;

        let entries = self.entries.read().await;
        let mut hits: Vec<SearchHit> = entries
            .iter()
            .filter(|(p, _)| {
                source_filter
                    .map(|s| p.source_filename == s)
                    .unwrap_or(true)
            })
            .map(|(p, e)| SearchHit {
                text: p.text.clone(),
                source_filename: p.source_filename.clone(),
                score: cosine_similarity(&query_embedding, e),
            })
            .filter(|hit| hit.score >= threshold)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }
}
