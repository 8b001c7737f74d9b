//! DocTalk Ingestion
//!
//! Turns uploaded documents into indexed passages:
//! 1. Duplicate guard (filename already indexed?)
//! 2. Text extraction (Tika server or plain text)
//! 3. Chunking (semantic layered or character window)
//! 4. Batched write to the vector index

pub mod chunker;
pub mod extract;
pub mod processor;

pub use chunker::Chunker;
pub use extract::{Extractor, PlainTextExtractor, TikaExtractor};
pub use processor::DocumentProcessor;
