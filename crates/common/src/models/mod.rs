//! Core data types flowing through the ingestion and chat pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// An uploaded document before extraction.
///
/// Consumed exactly once by the ingestion pipeline; the raw bytes are not
/// retained after extraction.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// A bounded span of document text stored as a retrievable unit.
///
/// Immutable once created. Ordering among passages of one document is
/// insertion order, but carries no meaning after indexing: the index
/// returns passages in relevance order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Unique passage id
    pub chunk_id: Uuid,

    /// Passage text (never empty or whitespace-only)
    pub text: String,

    /// Filename of the originating document
    pub source_filename: String,

    /// MIME type of the originating document
    pub mime_type: String,

    /// Hex SHA-256 of the text, for staleness detection
    pub content_hash: String,
}

impl Passage {
    /// Build a passage for one chunk of an ingested document.
    pub fn new(text: String, source_filename: &str, mime_type: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let content_hash = hex::encode(hasher.finalize());

        Self {
            chunk_id: Uuid::new_v4(),
            text,
            source_filename: source_filename.to_string(),
            mime_type: mime_type.to_string(),
            content_hash,
        }
    }
}

/// A search result with its relevance score, produced per query and
/// discarded after context assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Passage text
    pub text: String,

    /// Filename of the originating document
    pub source_filename: String,

    /// Relevance score (0.0 - 1.0, higher is more relevant)
    pub score: f32,
}

/// One chat request. Stateless: the core keeps no multi-turn memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatTurn {
    /// The user's message
    pub message: String,

    /// Explicit context supplied by the caller; when present, retrieval
    /// is skipped entirely
    pub context: Option<String>,

    /// Restrict retrieval to passages from this source document
    pub source_filter: Option<String>,
}

impl ChatTurn {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Whether the caller supplied usable explicit context.
    pub fn has_explicit_context(&self) -> bool {
        self.context
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }
}

/// The orchestrator's answer to one chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    /// Generated answer text
    pub reply: String,

    /// Whether the answer was grounded in context (explicit or retrieved)
    pub grounded: bool,
}

/// Outcome of a successful document ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReceipt {
    pub filename: String,
    pub mime_type: String,

    /// Length of the extracted text in characters
    pub extracted_chars: usize,

    /// Number of passages written to the index
    pub passage_count: usize,

    pub ingested_at: DateTime<Utc>,
}
