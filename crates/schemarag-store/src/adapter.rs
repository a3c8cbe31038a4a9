//! Relation store trait and error taxonomy

use schemarag_core::{EdgeGroup, JoinEdge, UpsertReport};
use std::collections::BTreeSet;

/// Errors from the relation store.
///
/// Write failures are recoverable warnings for ingestion (edge data is
/// redundantly recoverable by re-running extraction); read failures surface
/// to the retrieval orchestrator so it can omit relationship injection
/// instead of silently returning an empty edge set.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store write failed: {0}")]
    WriteFailed(String),

    #[error("store read failed: {0}")]
    ReadFailed(String),
}

/// Graph-queryable store of join edges.
///
/// Owned as an explicitly injected client handle, acquired once per process
/// lifetime; implementations must make the upsert of a single edge atomic at
/// the store's native granularity so concurrent readers never observe a torn
/// record (at worst they miss a just-added edge).
#[async_trait::async_trait]
pub trait RelationStore: Send + Sync {
    /// Upsert a batch of extracted edges.
    ///
    /// An incoming edge matching an existing record (same unordered endpoint
    /// pair + same normalized predicate) merges its provenance into the
    /// record; otherwise it is inserted. Re-ingesting the same corpus is
    /// idempotent.
    async fn upsert(&self, edges: Vec<JoinEdge>) -> Result<UpsertReport, StoreError>;

    /// Return all stored edges whose endpoints are both members of
    /// `table_names`, grouped one record per unordered pair (all distinct
    /// predicates per pair), in canonical lexicographic pair order.
    ///
    /// Must execute as a bounded-cost traversal relative to the size of
    /// `table_names`, not a full-store scan: this runs on the hot retrieval
    /// path.
    async fn scoped(&self, table_names: &BTreeSet<String>) -> Result<Vec<EdgeGroup>, StoreError>;
}
