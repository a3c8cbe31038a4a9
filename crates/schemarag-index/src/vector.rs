//! Dense vector index and embedding providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use schemarag_core::{EndpointConfig, TableDescriptor};

use crate::lexical::tokenize;

/// Errors raised while building or querying the vector index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("embedding provider unavailable: {reason}")]
    EmbeddingUnavailable { reason: String },

    #[error("embedding response malformed: {reason}")]
    InvalidResponse { reason: String },
}

/// Produces dense embeddings for descriptor and query text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Embedding provider backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(config: &EndpointConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input,
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| IndexError::EmbeddingUnavailable {
                reason: e.to_string(),
            })?;
        let response = response
            .error_for_status()
            .map_err(|e| IndexError::EmbeddingUnavailable {
                reason: e.to_string(),
            })?;
        let parsed: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| IndexError::InvalidResponse {
                    reason: e.to_string(),
                })?;
        if parsed.data.len() != input.len() {
            return Err(IndexError::InvalidResponse {
                reason: format!(
                    "expected {} embeddings, got {}",
                    input.len(),
                    parsed.data.len()
                ),
            });
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let batch = self.request(&[text.to_string()]).await?;
        batch
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::InvalidResponse {
                reason: "empty embedding batch".to_string(),
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

/// Deterministic offline embedder: tokens are hashed into a fixed number
/// of signed buckets and the result is L2-normalized. Useful for tests
/// and for running the pipeline without an embedding service.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

// FNV-1a, fixed so vectors are stable across platforms and releases.
fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let mut vector = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            let hash = fnv1a(&token);
            let slot = (hash % self.dim as u64) as usize;
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

/// A vector match with its cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub table: String,
    pub score: f32,
}

/// Immutable dense index: one embedding per table descriptor, searched
/// by exhaustive cosine similarity.
pub struct VectorIndex {
    entries: Vec<(String, Vec<f32>)>,
}

impl VectorIndex {
    pub async fn build(
        corpus: &[TableDescriptor],
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self, IndexError> {
        let texts: Vec<String> = corpus.iter().map(|t| t.descriptor_text()).collect();
        let embeddings = provider.embed_batch(&texts).await?;
        if embeddings.len() != corpus.len() {
            return Err(IndexError::InvalidResponse {
                reason: format!(
                    "expected {} embeddings, got {}",
                    corpus.len(),
                    embeddings.len()
                ),
            });
        }
        let entries: Vec<(String, Vec<f32>)> = corpus
            .iter()
            .map(|t| t.name.clone())
            .zip(embeddings)
            .collect();
        tracing::debug!(
            tables = entries.len(),
            dim = entries.first().map(|(_, e)| e.len()).unwrap_or(0),
            "vector index built"
        );
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the `limit` nearest tables by cosine similarity, ordered
    /// by similarity descending and table name ascending on ties.
    pub fn search(&self, query: &[f32], limit: usize) -> Vec<VectorHit> {
        let mut hits: Vec<VectorHit> = self
            .entries
            .iter()
            .map(|(table, embedding)| VectorHit {
                table: table.clone(),
                score: cosine(query, embedding),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.table.cmp(&b.table))
        });
        hits.truncate(limit);
        hits
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, comment: &str) -> TableDescriptor {
        TableDescriptor::new(name).with_comment(comment)
    }

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("customer orders").await.unwrap();
        let b = embedder.embed("customer orders").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn similar_text_scores_above_unrelated_text() {
        let embedder = HashEmbedder::new(256);
        let corpus = vec![
            table("orders", "customer orders with totals"),
            table("audit_log", "internal change history"),
        ];
        let index = VectorIndex::build(&corpus, &embedder).await.unwrap();
        let query = embedder.embed("orders placed by a customer").await.unwrap();
        let hits = index.search(&query, 2);
        assert_eq!(hits[0].table, "orders");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn search_truncates_to_limit() {
        let embedder = HashEmbedder::default();
        let corpus = vec![table("a", "x"), table("b", "y"), table("c", "z")];
        let index = VectorIndex::build(&corpus, &embedder).await.unwrap();
        let query = embedder.embed("x").await.unwrap();
        assert_eq!(index.search(&query, 2).len(), 2);
    }

    #[test]
    fn cosine_handles_zero_and_mismatched_vectors() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 0.0]), 0.0);
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
