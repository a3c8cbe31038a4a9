//! Hybrid schema retrieval orchestrator
//!
//! Ties the pieces together: mapper ingestion feeds the relation store,
//! and [`Retriever`] answers natural-language queries with a ranked table
//! subset plus the join edges scoped to it. The pipeline per call is
//! lexical + vector search (concurrent), intersection-gated reciprocal
//! rank fusion, optional precision rerank, then edge injection.

pub mod ingest;
pub mod rerank;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use schemarag_catalog::{CatalogAdapter, CatalogError};
use schemarag_core::{Candidate, RetrievalResult, RetrievalTuning, TableDescriptor};
use schemarag_index::{
    fuse, EmbeddingProvider, FusionConfig, IndexError, LexicalIndex, VectorIndex,
};
use schemarag_store::RelationStore;

pub use ingest::{extract_and_store, DocumentSource, RawStatement};
pub use rerank::{HttpRelevanceScorer, RelevanceScorer, Reranker, RerankError};

/// Errors that abort a retrieval call.
///
/// Rerank and store-read degradation are reported through flags on
/// [`RetrievalResult`], not through this type.
#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error("{index} index unavailable: {reason}")]
    IndexUnavailable {
        index: &'static str,
        reason: String,
    },

    #[error("catalog load failed: {0}")]
    Catalog(#[from] CatalogError),
}

/// Candidate ranking for one query, before top-K truncation.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    /// Fused (and possibly reranked) candidates, best first
    pub candidates: Vec<Candidate>,

    /// True when the precision rerank was applied
    pub reranked: bool,
}

/// Retrieval session over one catalog snapshot.
///
/// Indexes are built once at construction; queries are read-only and safe
/// to run concurrently.
pub struct Retriever {
    corpus: HashMap<String, TableDescriptor>,
    lexical: LexicalIndex,
    vector: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn RelationStore>,
    reranker: Option<Reranker>,
    tuning: RetrievalTuning,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever").finish_non_exhaustive()
    }
}

impl Retriever {
    /// Builds both indexes over `corpus`. Fails when the embedding
    /// provider cannot embed the descriptors.
    pub async fn build(
        corpus: Vec<TableDescriptor>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn RelationStore>,
        reranker: Option<Reranker>,
        tuning: RetrievalTuning,
    ) -> Result<Self, RetrieveError> {
        let vector = VectorIndex::build(&corpus, embedder.as_ref())
            .await
            .map_err(index_unavailable)?;
        let lexical = LexicalIndex::build(&corpus);
        debug!(tables = corpus.len(), "retrieval indexes built");
        let corpus = corpus.into_iter().map(|t| (t.name.clone(), t)).collect();
        Ok(Self {
            corpus,
            lexical,
            vector,
            embedder,
            store,
            reranker,
            tuning,
        })
    }

    /// Builds a retriever against one catalog scope snapshot.
    pub async fn from_catalog(
        catalog: &dyn CatalogAdapter,
        scope_id: &str,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn RelationStore>,
        reranker: Option<Reranker>,
        tuning: RetrievalTuning,
    ) -> Result<Self, RetrieveError> {
        let corpus = catalog.tables(scope_id).await?;
        debug!(
            adapter = catalog.name(),
            scope = scope_id,
            tables = corpus.len(),
            "catalog scope loaded"
        );
        Self::build(corpus, embedder, store, reranker, tuning).await
    }

    /// Ranks candidate tables for `query` without truncating to top-K.
    ///
    /// Exposed for explain-style tooling; [`Retriever::retrieve`] is the
    /// normal entry point.
    pub async fn rank(&self, query: &str) -> Result<Ranking, RetrieveError> {
        let pool_size = self.tuning.lexical_pool_size;
        let lexical_search = async { self.lexical.search(query, pool_size) };
        let vector_search = async {
            let embedding = self.embedder.embed(query).await?;
            Ok::<_, IndexError>(self.vector.search(&embedding, pool_size))
        };
        let (lexical_hits, vector_hits) = tokio::join!(lexical_search, vector_search);
        let vector_hits = vector_hits.map_err(index_unavailable)?;

        let fused = fuse(
            &lexical_hits,
            &vector_hits,
            &FusionConfig::from(&self.tuning),
        );
        let mut candidates: Vec<Candidate> = fused
            .into_iter()
            .enumerate()
            .map(|(i, c)| Candidate {
                table: c.table,
                lexical_score: c.lexical_score,
                vector_score: c.vector_score,
                fused_rank: i + 1,
                fused_score: c.fused_score,
                rerank_score: None,
            })
            .collect();

        let mut reranked = false;
        if let Some(reranker) = &self.reranker {
            if !candidates.is_empty() {
                let documents: Vec<String> = candidates
                    .iter()
                    .map(|c| self.descriptor_text(&c.table))
                    .collect();
                if let Some(scores) = reranker.scores(query, &documents).await {
                    for (candidate, score) in candidates.iter_mut().zip(&scores) {
                        candidate.rerank_score = Some(*score);
                    }
                    candidates.sort_by(|a, b| {
                        b.rerank_score
                            .partial_cmp(&a.rerank_score)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then_with(|| a.table.cmp(&b.table))
                    });
                    reranked = true;
                }
            }
        }

        Ok(Ranking {
            candidates,
            reranked,
        })
    }

    /// Answers `query` with at most `top_k` tables and the join edges
    /// whose endpoints both lie within the returned set.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<RetrievalResult, RetrieveError> {
        let mut ranking = self.rank(query).await?;
        if ranking.candidates.is_empty() {
            // No candidates is an answer, not an error.
            return Ok(RetrievalResult::empty());
        }
        ranking.candidates.truncate(top_k);

        let names: BTreeSet<String> = ranking
            .candidates
            .iter()
            .map(|c| c.table.clone())
            .collect();
        let (edges, edges_resolved) = match self.store.scoped(&names).await {
            Ok(groups) => (groups, true),
            Err(e) => {
                warn!(error = %e, "relation store read failed, returning tables without edges");
                (Vec::new(), false)
            }
        };

        let tables = ranking
            .candidates
            .iter()
            .filter_map(|c| self.corpus.get(&c.table).cloned())
            .collect();
        Ok(RetrievalResult {
            tables,
            edges,
            reranked: ranking.reranked,
            edges_resolved,
        })
    }

    fn descriptor_text(&self, table: &str) -> String {
        self.corpus
            .get(table)
            .map(|t| t.descriptor_text())
            .unwrap_or_else(|| table.to_string())
    }
}

fn index_unavailable(error: IndexError) -> RetrieveError {
    RetrieveError::IndexUnavailable {
        index: "vector",
        reason: error.to_string(),
    }
}
