//! Precision rerank stage.
//!
//! The reranker is an optional collaborator: when it is absent, errors,
//! times out, or returns a malformed response, retrieval keeps the fused
//! order and flags the result as not reranked. Degradation is never an
//! error for the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use schemarag_core::EndpointConfig;

/// Errors raised by a relevance scorer implementation.
#[derive(Error, Debug)]
pub enum RerankError {
    #[error("rerank service unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("rerank response malformed: {reason}")]
    InvalidResponse { reason: String },
}

/// Scores candidate documents against a query, higher is more relevant.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Must return exactly one score per input document, in input order.
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError>;
}

/// Relevance scorer backed by a Cohere-compatible rerank HTTP endpoint.
pub struct HttpRelevanceScorer {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankEntry>,
}

#[derive(Deserialize)]
struct RerankEntry {
    index: usize,
    relevance_score: f32,
}

impl HttpRelevanceScorer {
    pub fn new(config: &EndpointConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl RelevanceScorer for HttpRelevanceScorer {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError> {
        let body = RerankRequest {
            model: &self.model,
            query,
            documents,
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RerankError::Unavailable {
                reason: e.to_string(),
            })?;
        let parsed: RerankResponse =
            response
                .json()
                .await
                .map_err(|e| RerankError::InvalidResponse {
                    reason: e.to_string(),
                })?;

        // The service returns results sorted by relevance with the original
        // position in `index`; re-assemble scores in input order.
        let mut scores: Vec<Option<f32>> = vec![None; documents.len()];
        for entry in parsed.results {
            let slot = scores
                .get_mut(entry.index)
                .ok_or_else(|| RerankError::InvalidResponse {
                    reason: format!("result index {} out of range", entry.index),
                })?;
            *slot = Some(entry.relevance_score);
        }
        scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                s.ok_or_else(|| RerankError::InvalidResponse {
                    reason: format!("missing score for document {i}"),
                })
            })
            .collect()
    }
}

/// Wraps a [`RelevanceScorer`] with the timeout-and-degrade policy.
pub struct Reranker {
    scorer: Box<dyn RelevanceScorer>,
    timeout: Duration,
}

impl Reranker {
    pub fn new(scorer: Box<dyn RelevanceScorer>, timeout: Duration) -> Self {
        Self { scorer, timeout }
    }

    pub fn from_config(config: &EndpointConfig, timeout_ms: u64) -> Self {
        Self::new(
            Box::new(HttpRelevanceScorer::new(config)),
            Duration::from_millis(timeout_ms),
        )
    }

    /// Scores `documents` against `query` within the timeout.
    ///
    /// Returns `None` when the scorer times out, fails, or returns the
    /// wrong number of scores; the caller keeps the fused order.
    pub async fn scores(&self, query: &str, documents: &[String]) -> Option<Vec<f32>> {
        if documents.is_empty() {
            return Some(Vec::new());
        }
        match tokio::time::timeout(self.timeout, self.scorer.score(query, documents)).await {
            Ok(Ok(scores)) if scores.len() == documents.len() => Some(scores),
            Ok(Ok(scores)) => {
                warn!(
                    expected = documents.len(),
                    got = scores.len(),
                    "rerank returned wrong score count, keeping fused order"
                );
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "rerank failed, keeping fused order");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "rerank timed out, keeping fused order"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticScorer {
        scores: Vec<f32>,
        delay: Duration,
        fail: bool,
    }

    impl StaticScorer {
        fn new(scores: Vec<f32>) -> Self {
            Self {
                scores,
                delay: Duration::ZERO,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl RelevanceScorer for StaticScorer {
        async fn score(
            &self,
            _query: &str,
            _documents: &[String],
        ) -> Result<Vec<f32>, RerankError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(RerankError::Unavailable {
                    reason: "connection refused".to_string(),
                });
            }
            Ok(self.scores.clone())
        }
    }

    fn docs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("doc {i}")).collect()
    }

    #[tokio::test]
    async fn scores_pass_through_on_success() {
        let reranker = Reranker::new(
            Box::new(StaticScorer::new(vec![0.2, 0.9])),
            Duration::from_secs(1),
        );
        let scores = reranker.scores("q", &docs(2)).await;
        assert_eq!(scores, Some(vec![0.2, 0.9]));
    }

    #[tokio::test]
    async fn timeout_degrades_to_none() {
        let scorer = StaticScorer {
            scores: vec![0.5],
            delay: Duration::from_millis(200),
            fail: false,
        };
        let reranker = Reranker::new(Box::new(scorer), Duration::from_millis(10));
        assert_eq!(reranker.scores("q", &docs(1)).await, None);
    }

    #[tokio::test]
    async fn scorer_error_degrades_to_none() {
        let scorer = StaticScorer {
            scores: Vec::new(),
            delay: Duration::ZERO,
            fail: true,
        };
        let reranker = Reranker::new(Box::new(scorer), Duration::from_secs(1));
        assert_eq!(reranker.scores("q", &docs(1)).await, None);
    }

    #[tokio::test]
    async fn wrong_score_count_degrades_to_none() {
        let reranker = Reranker::new(
            Box::new(StaticScorer::new(vec![0.5])),
            Duration::from_secs(1),
        );
        assert_eq!(reranker.scores("q", &docs(3)).await, None);
    }

    #[tokio::test]
    async fn empty_candidate_list_short_circuits() {
        let scorer = StaticScorer {
            scores: Vec::new(),
            delay: Duration::from_secs(10),
            fail: true,
        };
        let reranker = Reranker::new(Box::new(scorer), Duration::from_millis(10));
        assert_eq!(reranker.scores("q", &[]).await, Some(Vec::new()));
    }
}
