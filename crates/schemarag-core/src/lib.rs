//! SchemaRAG Core
//!
//! Shared domain model for join-relationship mining and hybrid schema
//! retrieval: table descriptors, join edges, retrieval results, ingestion
//! reports, and configuration.
//! Issue codes are stable identifiers - never rename them.

pub mod config;
pub mod model;
pub mod report;

pub use config::{Config, ConfigError, DialectConfig, EndpointConfig, RetrievalTuning};
pub use model::{
    Candidate, ColumnDescriptor, EdgeGroup, JoinEdge, JoinKind, Provenance, RetrievalResult,
    TableDescriptor,
};
pub use report::{IngestIssue, IngestReport, IssueCode, UpsertReport};
