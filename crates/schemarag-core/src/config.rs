//! Configuration schema (schemarag.toml)

use serde::{Deserialize, Serialize};

/// SQL dialect the mapper corpus was written against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// MySQL dialect (the common mapper-corpus default)
    MySql,

    /// PostgreSQL dialect
    Postgres,

    /// Generic ANSI SQL
    Ansi,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::MySql
    }
}

/// Tunable constants for the intersection-then-fuse retrieval policy.
///
/// Recall/precision tradeoffs are a primary production tuning lever, so these
/// are explicit configuration rather than hard-coded constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalTuning {
    /// Size of the lexical pool used as the intersection gate
    #[serde(default = "default_lexical_pool_size")]
    pub lexical_pool_size: usize,

    /// Candidate cap entering the precision reranker
    #[serde(default = "default_fusion_limit")]
    pub fusion_limit: usize,

    /// Reciprocal-rank-fusion dampening constant (> 0)
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Final table count returned to callers
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Rerank collaborator timeout in milliseconds; on expiry the call
    /// degrades to fused order without retry
    #[serde(default = "default_rerank_timeout_ms")]
    pub rerank_timeout_ms: u64,
}

impl Default for RetrievalTuning {
    fn default() -> Self {
        Self {
            lexical_pool_size: default_lexical_pool_size(),
            fusion_limit: default_fusion_limit(),
            rrf_k: default_rrf_k(),
            top_k: default_top_k(),
            rerank_timeout_ms: default_rerank_timeout_ms(),
        }
    }
}

const fn default_lexical_pool_size() -> usize {
    50
}

const fn default_fusion_limit() -> usize {
    20
}

const fn default_rrf_k() -> f32 {
    60.0
}

const fn default_top_k() -> usize {
    10
}

const fn default_rerank_timeout_ms() -> u64 {
    3000
}

/// Connection settings for an HTTP collaborator (embedding or rerank service)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Service URL
    pub url: String,

    /// Model identifier passed through to the service
    #[serde(default)]
    pub model: String,

    /// Bearer token, if the service requires one
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQL dialect for the mapper corpus
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Retrieval tuning constants
    #[serde(default)]
    pub tuning: RetrievalTuning,

    /// Embedding provider endpoint (absent => deterministic local embedder)
    #[serde(default)]
    pub embedding: Option<EndpointConfig>,

    /// Rerank service endpoint (absent => rerank stage skipped)
    #[serde(default)]
    pub rerank: Option<EndpointConfig>,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Load config from a TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
