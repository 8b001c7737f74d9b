//! Similarity retrieval and context assembly
//!
//! Delegates nearest-neighbor ranking to the vector index (the core never
//! re-ranks) and concatenates the returned passages into one context
//! string for prompt building.

use doctalk_common::config::RetrievalConfig;
use doctalk_common::errors::Result;
use doctalk_common::metrics;
use doctalk_common::models::SearchHit;
use doctalk_common::VectorIndex;
use std::sync::Arc;
use tracing::info;

/// Configured retriever over a vector index.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { index, config })
    }

    /// Run a similarity query with the configured top-k and threshold,
    /// optionally restricted to one source document.
    ///
    /// Hits come back in the index's relevance order (descending).
    pub async fn retrieve(
        &self,
        query: &str,
        source_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let hits = self
            .index
            .query(
                query,
                self.config.top_k,
                self.config.similarity_threshold,
                source_filter,
            )
            .await?;

        info!(
            query = %query,
            filter = source_filter.unwrap_or("<none>"),
            hit_count = hits.len(),
            "Similarity search"
        );
        metrics::record_retrieval(hits.len());

        Ok(hits)
    }

    /// Concatenate hit texts, in the returned order, into one context
    /// string. Passages are kept verbatim; overlapping text is not
    /// deduplicated.
    pub fn assemble_context(&self, hits: &[SearchHit]) -> String {
        hits.iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.config.context_separator)
    }
}
