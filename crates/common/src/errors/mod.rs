//! Error types for the DocTalk core
//!
//! Provides:
//! - Distinct error variants for each failure mode in the pipeline
//! - Stable category labels for client handling
//! - A structured, serializable error response shape
//!
//! "No relevant results" from retrieval is deliberately NOT part of this
//! taxonomy: it triggers the plain-chat fallback path and is logged at
//! warn level by the orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Startup / construction errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Ingestion errors
    #[error("Document '{filename}' is already indexed; remove it before uploading again")]
    DuplicateDocument { filename: String },

    #[error("Text extraction failed for '{filename}': {message}")]
    ExtractionFailed { filename: String, message: String },

    #[error("No extractable text in '{filename}'")]
    EmptyExtraction { filename: String },

    // External collaborator errors
    #[error("Embedding request failed: {message}")]
    EmbeddingFailed { message: String },

    #[error("Vector index unavailable: {message}")]
    IndexUnavailable { message: String },

    #[error("Completion engine unavailable: {message}")]
    ModelUnavailable { message: String },

    #[error("Completion engine timed out after {timeout_secs}s")]
    ModelTimeout { timeout_secs: u64 },

    // Request errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Stable category label for this error.
    ///
    /// Labels are part of the client contract and never change between
    /// releases, unlike the human-readable detail strings.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Configuration { .. } => "configuration_error",
            AppError::DuplicateDocument { .. } => "duplicate_document",
            AppError::ExtractionFailed { .. } => "extraction_failed",
            AppError::EmptyExtraction { .. } => "empty_extraction",
            AppError::EmbeddingFailed { .. } => "embedding_failed",
            AppError::IndexUnavailable { .. } => "index_unavailable",
            AppError::ModelUnavailable { .. } => "model_unavailable",
            AppError::ModelTimeout { .. } => "model_timeout",
            AppError::Validation { .. } => "validation_error",
            AppError::Internal { .. } => "internal_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::Other(_) => "internal_error",
        }
    }

    /// Whether this error reflects an unreachable upstream collaborator
    /// (vector index or completion engine) rather than a bad request.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingFailed { .. }
                | AppError::IndexUnavailable { .. }
                | AppError::ModelUnavailable { .. }
                | AppError::ModelTimeout { .. }
        )
    }

    /// Whether this error is a rejected request rather than a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::DuplicateDocument { .. }
                | AppError::ExtractionFailed { .. }
                | AppError::EmptyExtraction { .. }
                | AppError::Validation { .. }
        )
    }

    /// Build the structured response shape for this error.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            category: self.category().to_string(),
            detail: self.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

/// Structured error response handed to the (out-of-scope) transport layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub category: String,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_are_stable() {
        let err = AppError::DuplicateDocument {
            filename: "report.pdf".into(),
        };
        assert_eq!(err.category(), "duplicate_document");
        assert!(err.is_client_error());
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_upstream_classification() {
        let err = AppError::IndexUnavailable {
            message: "connection refused".into(),
        };
        assert!(err.is_upstream());
        assert_eq!(err.category(), "index_unavailable");
    }

    #[test]
    fn test_response_shape() {
        let err = AppError::EmptyExtraction {
            filename: "blank.xlsx".into(),
        };
        let resp = err.to_response();
        assert_eq!(resp.category, "empty_extraction");
        assert!(resp.detail.contains("blank.xlsx"));
    }
}
