//! Relationship store adapter
//!
//! Persists mined join edges behind a narrow, graph-queryable interface:
//! idempotent upserts keyed on edge identity, and pattern-scoped queries
//! that return only edges whose endpoints both lie within a supplied table
//! set. The interface is agnostic to the backing engine; the in-memory
//! adjacency-map implementation here serves small deployments and tests,
//! and a graph-native backend can be swapped in without touching the
//! extractor or retrieval logic.

pub mod adapter;
pub mod memory;

pub use adapter::{RelationStore, StoreError};
pub use memory::InMemoryRelationStore;
