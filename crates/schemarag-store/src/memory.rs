//! In-memory adjacency-map relation store

use crate::adapter::{RelationStore, StoreError};
use schemarag_core::{EdgeGroup, JoinEdge, UpsertReport};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct StoreInner {
    /// Edge identity key -> merged edge record
    edges: HashMap<String, JoinEdge>,

    /// Table name -> identity keys of edges touching it
    adjacency: HashMap<String, HashSet<String>>,
}

/// Adjacency-map store for small deployments and tests.
///
/// Scoped queries walk only the adjacency lists of the supplied table set.
/// Upserts take the write lock once per batch, so each edge record is
/// atomic from a reader's point of view.
pub struct InMemoryRelationStore {
    inner: Arc<RwLock<StoreInner>>,

    /// Simulate an unreachable store on writes
    fail_writes: bool,

    /// Simulate an unreachable store on reads
    fail_reads: bool,
}

impl InMemoryRelationStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            fail_writes: false,
            fail_reads: false,
        }
    }

    /// Fail every upsert with `StoreError::WriteFailed`
    pub fn with_write_failure(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Fail every scoped query with `StoreError::ReadFailed`
    pub fn with_read_failure(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Total number of merged edge records currently stored
    pub async fn edge_count(&self) -> usize {
        self.inner.read().await.edges.len()
    }

    /// Every stored edge, grouped by unordered pair in canonical order.
    /// Intended for dump-style tooling; scoped queries are the hot path.
    pub async fn snapshot(&self) -> Vec<EdgeGroup> {
        let inner = self.inner.read().await;
        let mut groups: BTreeMap<(String, String), Vec<JoinEdge>> = BTreeMap::new();
        for edge in inner.edges.values() {
            let (left, right) = edge.unordered_pair();
            groups
                .entry((left.to_string(), right.to_string()))
                .or_default()
                .push(edge.clone());
        }
        groups
            .into_iter()
            .map(|((left, right), mut edges)| {
                edges.sort_by(|a, b| a.predicate.cmp(&b.predicate));
                EdgeGroup { left, right, edges }
            })
            .collect()
    }
}

impl Default for InMemoryRelationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryRelationStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            fail_writes: self.fail_writes,
            fail_reads: self.fail_reads,
        }
    }
}

#[async_trait::async_trait]
impl RelationStore for InMemoryRelationStore {
    async fn upsert(&self, edges: Vec<JoinEdge>) -> Result<UpsertReport, StoreError> {
        if self.fail_writes {
            return Err(StoreError::WriteFailed(
                "simulated store outage".to_string(),
            ));
        }

        let mut report = UpsertReport::default();
        let mut inner = self.inner.write().await;

        for edge in edges {
            let key = edge.edge_key();
            if let Some(existing) = inner.edges.get_mut(&key) {
                // Re-ingestion with identical provenance changes nothing but
                // still counts as a merge.
                existing.provenance.extend(edge.provenance);
                report.merged += 1;
            } else {
                inner
                    .adjacency
                    .entry(edge.from_table.clone())
                    .or_default()
                    .insert(key.clone());
                inner
                    .adjacency
                    .entry(edge.to_table.clone())
                    .or_default()
                    .insert(key.clone());
                inner.edges.insert(key, edge);
                report.inserted += 1;
            }
        }

        tracing::debug!(
            inserted = report.inserted,
            merged = report.merged,
            "relation store upsert"
        );
        Ok(report)
    }

    async fn scoped(&self, table_names: &BTreeSet<String>) -> Result<Vec<EdgeGroup>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::ReadFailed("simulated store outage".to_string()));
        }

        let inner = self.inner.read().await;

        // Walk adjacency lists of the requested tables only.
        let mut candidate_keys: HashSet<&String> = HashSet::new();
        for table in table_names {
            if let Some(keys) = inner.adjacency.get(table) {
                candidate_keys.extend(keys);
            }
        }

        let mut groups: BTreeMap<(String, String), Vec<JoinEdge>> = BTreeMap::new();
        for key in candidate_keys {
            let Some(edge) = inner.edges.get(key) else {
                continue;
            };
            if !table_names.contains(&edge.from_table) || !table_names.contains(&edge.to_table) {
                continue;
            }
            let (left, right) = edge.unordered_pair();
            groups
                .entry((left.to_string(), right.to_string()))
                .or_default()
                .push(edge.clone());
        }

        Ok(groups
            .into_iter()
            .map(|((left, right), mut edges)| {
                edges.sort_by(|a, b| a.predicate.cmp(&b.predicate));
                EdgeGroup { left, right, edges }
            })
            .collect())
    }
}
