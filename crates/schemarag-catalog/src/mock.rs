//! Mock catalog adapter for testing
//!
//! Returns predefined descriptors without touching a real metadata source.
//! Useful for unit tests, offline demos, and simulating error conditions.

use crate::adapter::{CatalogAdapter, CatalogError};
use schemarag_core::TableDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mock catalog storing descriptors per scope in memory
pub struct MockCatalog {
    scopes: Arc<RwLock<HashMap<String, Vec<TableDescriptor>>>>,

    /// Simulate a network failure on every call
    fail_queries: bool,

    /// Simulated latency (milliseconds)
    latency_ms: u64,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            scopes: Arc::new(RwLock::new(HashMap::new())),
            fail_queries: false,
            latency_ms: 0,
        }
    }

    /// Register a table descriptor under a scope
    pub async fn add_table(&self, scope_id: &str, table: TableDescriptor) {
        self.scopes
            .write()
            .await
            .entry(scope_id.to_string())
            .or_default()
            .push(table);
    }

    /// Register a full scope at once
    pub async fn add_scope(&self, scope_id: &str, tables: Vec<TableDescriptor>) {
        self.scopes
            .write()
            .await
            .insert(scope_id.to_string(), tables);
    }

    /// Fail every query with a simulated network error
    pub fn with_query_failure(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    /// Add simulated latency to every call
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockCatalog {
    fn clone(&self) -> Self {
        Self {
            scopes: Arc::clone(&self.scopes),
            fail_queries: self.fail_queries,
            latency_ms: self.latency_ms,
        }
    }
}

#[async_trait::async_trait]
impl CatalogAdapter for MockCatalog {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn tables(&self, scope_id: &str) -> Result<Vec<TableDescriptor>, CatalogError> {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
        if self.fail_queries {
            return Err(CatalogError::NetworkError(
                "simulated catalog failure".to_string(),
            ));
        }

        self.scopes
            .read()
            .await
            .get(scope_id)
            .cloned()
            .ok_or_else(|| CatalogError::ScopeNotFound(scope_id.to_string()))
    }
}
