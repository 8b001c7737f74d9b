//! DocTalk Common Library
//!
//! Shared code for the DocTalk document-chat core:
//! - Core data types (documents, passages, search hits, chat turns)
//! - Error taxonomy with stable category labels
//! - Configuration management
//! - Embedding client abstraction and query-embedding cache
//! - Vector index abstraction (Chroma client, in-memory scan)
//! - Completion engine abstraction (blocking and streaming)
//! - Metrics and observability helpers

pub mod completion;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use completion::{CompletionEngine, TokenStream};
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use index::VectorIndex;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
