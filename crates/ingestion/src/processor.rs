//! Ingestion processor
//!
//! Drives one document through the pipeline: duplicate guard, text
//! extraction, chunking, and a single batched write to the vector index.
//! Nothing is written before every earlier stage has succeeded.

use crate::chunker::Chunker;
use crate::extract::Extractor;
use chrono::Utc;
use doctalk_common::config::{ChunkingConfig, IngestionConfig};
use doctalk_common::errors::{AppError, Result};
use doctalk_common::metrics;
use doctalk_common::models::{DocumentReceipt, Passage, RawDocument};
use doctalk_common::VectorIndex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Document ingestion pipeline.
pub struct DocumentProcessor {
    extractor: Arc<dyn Extractor>,
    index: Arc<dyn VectorIndex>,
    chunker: Chunker,
    config: IngestionConfig,
}

impl DocumentProcessor {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
        config: IngestionConfig,
    ) -> Result<Self> {
        Ok(Self {
            extractor,
            index,
            chunker: Chunker::new(chunking)?,
            config,
        })
    }

    /// Ingest one uploaded document.
    ///
    /// Re-uploading an already-indexed filename is rejected before any
    /// extraction or chunking runs (when `reject_duplicates` is on).
    #[instrument(skip(self, document), fields(filename = %document.filename))]
    pub async fn ingest(&self, document: RawDocument) -> Result<DocumentReceipt> {
        if document.filename.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Document filename must not be empty".to_string(),
            });
        }
        if document.bytes.is_empty() {
            return Err(AppError::Validation {
                message: "Document payload must not be empty".to_string(),
            });
        }

        if self.config.reject_duplicates {
            self.check_duplicate(&document.filename).await?;
        }

        let text = self.extractor.extract(&document).await?;
        if text.trim().is_empty() {
            warn!("Upload rejected: no extractable text");
            return Err(AppError::EmptyExtraction {
                filename: document.filename.clone(),
            });
        }

        let chunks = self.chunker.chunk(&text);
        debug!(chunk_count = chunks.len(), "Text chunked");

        let passages: Vec<Passage> = chunks
            .into_iter()
            .map(|chunk| Passage::new(chunk, &document.filename, &document.mime_type))
            .collect();
        let passage_count = passages.len();

        self.index.add(passages).await?;

        metrics::record_ingestion(passage_count);
        info!(passage_count, "Document indexed");

        Ok(DocumentReceipt {
            filename: document.filename,
            mime_type: document.mime_type,
            extracted_chars: text.chars().count(),
            passage_count,
            ingested_at: Utc::now(),
        })
    }

    /// Probe the index for any passage already tagged with this filename.
    async fn check_duplicate(&self, filename: &str) -> Result<()> {
        let existing = self
            .index
            .query(filename, 1, 0.0, Some(filename))
            .await?;

        if !existing.is_empty() {
            metrics::record_duplicate_rejected();
            return Err(AppError::DuplicateDocument {
                filename: filename.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use doctalk_common::embeddings::MockEmbedder;
    use doctalk_common::index::InMemoryIndex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Extractor returning a fixed text and counting invocations.
    struct FixedExtractor {
        text: String,
        calls: AtomicUsize,
    }

    impl FixedExtractor {
        fn new(text: &str) -> Self {
            Self {
                text: text.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Extractor for FixedExtractor {
        async fn extract(&self, _document: &RawDocument) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.clone())
        }
    }

    fn upload(filename: &str) -> RawDocument {
        RawDocument {
            filename: filename.to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: vec![0x25, 0x50, 0x44, 0x46],
        }
    }

    fn processor(
        extractor: Arc<FixedExtractor>,
        index: Arc<InMemoryIndex>,
        reject_duplicates: bool,
    ) -> DocumentProcessor {
        DocumentProcessor::new(
            extractor,
            index,
            ChunkingConfig::default(),
            IngestionConfig {
                reject_duplicates,
                ..IngestionConfig::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_successful_ingestion() {
        let extractor = Arc::new(FixedExtractor::new(
            "First paragraph of the report.\n\nSecond paragraph of the report.",
        ));
        let index = Arc::new(InMemoryIndex::new(Arc::new(MockEmbedder::new(8))));
        let processor = processor(Arc::clone(&extractor), Arc::clone(&index), true);

        let receipt = processor.ingest(upload("report.pdf")).await.unwrap();

        assert_eq!(receipt.filename, "report.pdf");
        assert!(receipt.passage_count >= 1);
        assert_eq!(index.len().await, receipt.passage_count);
        assert!(receipt.extracted_chars > 0);
    }

    #[tokio::test]
    async fn test_duplicate_upload_rejected_before_extraction() {
        let extractor = Arc::new(FixedExtractor::new("Some body text for the document."));
        let index = Arc::new(InMemoryIndex::new(Arc::new(MockEmbedder::new(8))));
        let processor = processor(Arc::clone(&extractor), Arc::clone(&index), true);

        processor.ingest(upload("report.pdf")).await.unwrap();
        let indexed = index.len().await;

        let err = processor.ingest(upload("report.pdf")).await.unwrap_err();
        assert_eq!(err.category(), "duplicate_document");

        // No second extraction, no extra index writes
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(index.len().await, indexed);
    }

    #[tokio::test]
    async fn test_duplicate_guard_can_be_disabled() {
        let extractor = Arc::new(FixedExtractor::new("Some body text for the document."));
        let index = Arc::new(InMemoryIndex::new(Arc::new(MockEmbedder::new(8))));
        let processor = processor(Arc::clone(&extractor), Arc::clone(&index), false);

        processor.ingest(upload("report.pdf")).await.unwrap();
        let first = index.len().await;
        processor.ingest(upload("report.pdf")).await.unwrap();

        assert_eq!(index.len().await, first * 2);
    }

    #[tokio::test]
    async fn test_blank_extraction_rejected() {
        let extractor = Arc::new(FixedExtractor::new("   \n\n  "));
        let index = Arc::new(InMemoryIndex::new(Arc::new(MockEmbedder::new(8))));
        let processor = processor(Arc::clone(&extractor), Arc::clone(&index), true);

        let err = processor.ingest(upload("empty.pdf")).await.unwrap_err();
        assert_eq!(err.category(), "empty_extraction");
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_payload_rejected() {
        let extractor = Arc::new(FixedExtractor::new("text"));
        let index = Arc::new(InMemoryIndex::new(Arc::new(MockEmbedder::new(8))));
        let processor = processor(Arc::clone(&extractor), Arc::clone(&index), true);

        let doc = RawDocument {
            filename: "report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: Vec::new(),
        };
        let err = processor.ingest(doc).await.unwrap_err();
        assert_eq!(err.category(), "validation_error");
    }
}
