//! Text extraction abstraction
//!
//! Extraction turns uploaded bytes into plain text. Format internals
//! (PDF, Excel, OCR, ...) belong to the extraction backend, not to this
//! crate; a Tika server handles the heavy formats.

use async_trait::async_trait;
use doctalk_common::config::IngestionConfig;
use doctalk_common::errors::{AppError, Result};
use doctalk_common::models::RawDocument;
use std::time::Duration;
use tracing::debug;

/// Trait for extraction backends.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract plain text from an uploaded document.
    ///
    /// Fails with [`AppError::ExtractionFailed`] on unreadable or
    /// unsupported input. An empty result is legal here; the ingestion
    /// pipeline rejects it separately.
    async fn extract(&self, document: &RawDocument) -> Result<String>;
}

/// Extractor backed by an Apache Tika server.
///
/// Sends the raw bytes to `PUT {base}/tika` with `Accept: text/plain`;
/// Tika detects the format and returns the text body.
pub struct TikaExtractor {
    client: reqwest::Client,
    base_url: String,
}

impl TikaExtractor {
    pub fn new(config: &IngestionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.tika_url.clone(),
        })
    }
}

#[async_trait]
impl Extractor for TikaExtractor {
    async fn extract(&self, document: &RawDocument) -> Result<String> {
        let url = format!("{}/tika", self.base_url);

        let response = self
            .client
            .put(&url)
            .header("Accept", "text/plain")
            .header("Content-Type", "application/octet-stream")
            .body(document.bytes.clone())
            .send()
            .await
            .map_err(|e| AppError::ExtractionFailed {
                filename: document.filename.clone(),
                message: format!("Tika server unreachable: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExtractionFailed {
                filename: document.filename.clone(),
                message: format!("Tika server error - status: {}", response.status()),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::ExtractionFailed {
                filename: document.filename.clone(),
                message: format!("Failed to read Tika response: {}", e),
            })?;

        debug!(filename = %document.filename, chars = text.chars().count(), "Tika extraction OK");
        Ok(text)
    }
}

/// Extractor for plain-text uploads; no server round-trip needed.
pub struct PlainTextExtractor;

#[async_trait]
impl Extractor for PlainTextExtractor {
    async fn extract(&self, document: &RawDocument) -> Result<String> {
        if !document.mime_type.starts_with("text/") {
            return Err(AppError::ExtractionFailed {
                filename: document.filename.clone(),
                message: format!("Unsupported type for plain extraction: {}", document.mime_type),
            });
        }

        String::from_utf8(document.bytes.clone()).map_err(|e| AppError::ExtractionFailed {
            filename: document.filename.clone(),
            message: format!("Invalid UTF-8: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_doc(bytes: Vec<u8>, mime_type: &str) -> RawDocument {
        RawDocument {
            filename: "notes.txt".to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        }
    }

    #[tokio::test]
    async fn test_plain_text_extraction() {
        let doc = text_doc(b"hello there".to_vec(), "text/plain");
        let text = PlainTextExtractor.extract(&doc).await.unwrap();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn test_plain_text_rejects_binary_types() {
        let doc = text_doc(vec![1, 2, 3], "application/pdf");
        let err = PlainTextExtractor.extract(&doc).await.unwrap_err();
        assert_eq!(err.category(), "extraction_failed");
    }

    #[tokio::test]
    async fn test_plain_text_rejects_invalid_utf8() {
        let doc = text_doc(vec![0xff, 0xfe, 0x00], "text/plain");
        let err = PlainTextExtractor.extract(&doc).await.unwrap_err();
        assert_eq!(err.category(), "extraction_failed");
    }
}
