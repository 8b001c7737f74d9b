//! Configuration management for the DocTalk core
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml)
//! - Default values
//!
//! All tunables are plain immutable values handed to component constructors;
//! nothing here is ambient state. Validation runs once at load time and a
//! bad chunk/overlap relationship (or any other invalid tunable) is fatal at
//! startup, never a per-request failure.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Chat orchestration configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Completion engine configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Document ingestion configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Query-embedding cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Text segmentation strategy.
///
/// Selected explicitly via configuration; the two algorithms are never
/// mixed implicitly within one ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Layered paragraph -> sentence -> aggregation with trailing-unit overlap
    Semantic,
    /// Fixed character window advancing by `chunk_size - chunk_overlap`
    Window,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive window chunks in characters
    /// (must stay below `chunk_size`)
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of trailing units re-seeded into the next chunk
    /// (semantic strategy)
    #[serde(default = "default_overlap_units")]
    pub overlap_units: usize,

    /// Segmentation strategy
    #[serde(default = "default_strategy")]
    pub strategy: ChunkStrategy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Maximum number of passages returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum similarity score for a hit to be considered relevant
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Separator placed between passages in the assembled context
    #[serde(default = "default_context_separator")]
    pub context_separator: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Grounded-answer prompt template; must contain `{context}` and
    /// `{question}` placeholders
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,

    /// Token budget for grounded (context-backed) answers
    #[serde(default = "default_max_tokens_grounded")]
    pub max_tokens_grounded: u32,

    /// Token budget for plain (ungrounded) answers
    #[serde(default = "default_max_tokens_plain")]
    pub max_tokens_plain: u32,

    /// Sampling temperature for grounded answers
    #[serde(default = "default_temperature_grounded")]
    pub temperature_grounded: f32,

    /// Sampling temperature for plain answers
    #[serde(default = "default_temperature_plain")]
    pub temperature_plain: f32,

    /// Opportunistically retrieve even when RAG was not requested
    #[serde(default)]
    pub auto_rag: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Vector index base URL (Chroma server)
    #[serde(default = "default_index_url")]
    pub url: String,

    /// Collection holding the document passages
    #[serde(default = "default_index_collection")]
    pub collection: String,

    /// Request timeout in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Chat-completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Tika server base URL for text extraction
    #[serde(default = "default_tika_url")]
    pub tika_url: String,

    /// Reject uploads whose filename is already indexed
    #[serde(default = "default_reject_duplicates")]
    pub reject_duplicates: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Maximum number of cached query embeddings
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Entry time-to-live in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

// Default value functions
fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 200 }
fn default_overlap_units() -> usize { 1 }
fn default_strategy() -> ChunkStrategy { ChunkStrategy::Semantic }
fn default_top_k() -> usize { 5 }
fn default_similarity_threshold() -> f32 { 0.3 }
fn default_context_separator() -> String { "\n---\n".to_string() }
fn default_prompt_template() -> String {
    "CONTEXT:\n{context}\n\nUSER QUESTION: {question}".to_string()
}
fn default_max_tokens_grounded() -> u32 { 512 }
fn default_max_tokens_plain() -> u32 { 120 }
fn default_temperature_grounded() -> f32 { 0.2 }
fn default_temperature_plain() -> f32 { 0.7 }
fn default_index_url() -> String { "http://localhost:8000".to_string() }
fn default_index_collection() -> String { "documents".to_string() }
fn default_index_timeout() -> u64 { 30 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_timeout() -> u64 { 30 }
fn default_tika_url() -> String { "http://localhost:9998".to_string() }
fn default_reject_duplicates() -> bool { true }
fn default_cache_max_entries() -> usize { 200 }
fn default_cache_ttl() -> u64 { 1800 }

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            overlap_units: default_overlap_units(),
            strategy: default_strategy(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            context_separator: default_context_separator(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            prompt_template: default_prompt_template(),
            max_tokens_grounded: default_max_tokens_grounded(),
            max_tokens_plain: default_max_tokens_plain(),
            temperature_grounded: default_temperature_grounded(),
            temperature_plain: default_temperature_plain(),
            auto_rag: false,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            collection: default_index_collection(),
            timeout_secs: default_index_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            tika_url: default_tika_url(),
            reject_duplicates: default_reject_duplicates(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            chat: ChatConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            ingestion: IngestionConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__TOP_K=8
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Configuration {
                message: e.to_string(),
            })?;

        let config: AppConfig =
            config
                .try_deserialize()
                .map_err(|e| AppError::Configuration {
                    message: e.to_string(),
                })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Configuration {
                message: e.to_string(),
            })?;

        let config: AppConfig =
            config
                .try_deserialize()
                .map_err(|e| AppError::Configuration {
                    message: e.to_string(),
                })?;

        config.validate()?;
        Ok(config)
    }

    /// Check every tunable once, before any component is constructed.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.chat.validate()?;
        Ok(())
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Configuration {
                message: "chunking.chunk_size must be > 0".to_string(),
            });
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Configuration {
                message: format!(
                    "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                    self.chunk_overlap, self.chunk_size
                ),
            });
        }
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k < 1 {
            return Err(AppError::Configuration {
                message: "retrieval.top_k must be >= 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AppError::Configuration {
                message: format!(
                    "retrieval.similarity_threshold ({}) must be in [0.0, 1.0]",
                    self.similarity_threshold
                ),
            });
        }
        Ok(())
    }
}

impl ChatConfig {
    pub fn validate(&self) -> Result<()> {
        for placeholder in ["{context}", "{question}"] {
            if !self.prompt_template.contains(placeholder) {
                return Err(AppError::Configuration {
                    message: format!(
                        "chat.prompt_template is missing the {} placeholder",
                        placeholder
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.chat.max_tokens_plain, 120);
        assert_eq!(config.chunking.strategy, ChunkStrategy::Semantic);
    }

    #[test]
    fn test_overlap_must_stay_below_chunk_size() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..ChunkingConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.category(), "configuration_error");
    }

    #[test]
    fn test_threshold_range() {
        let config = RetrievalConfig {
            similarity_threshold: 1.5,
            ..RetrievalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prompt_template_placeholders_required() {
        let config = ChatConfig {
            prompt_template: "CONTEXT: {context}".to_string(),
            ..ChatConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("{question}"));
    }
}
