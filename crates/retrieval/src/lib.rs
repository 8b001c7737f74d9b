//! DocTalk Retrieval
//!
//! Maps a user question to relevant indexed passages:
//! - Query rewriting for known intent families (summary, conclusion,
//!   introduction)
//! - Similarity search with top-k cap, score threshold, and optional
//!   source-document filter
//! - Context assembly for prompt building

pub mod query;
pub mod retriever;

pub use query::rewrite_query;
pub use retriever::Retriever;
