//! Catalog adapter trait for fetching table descriptors

use schemarag_core::TableDescriptor;

/// Errors that can occur when loading a catalog scope
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("scope not found: {0}")]
    ScopeNotFound(String),

    #[error("catalog query failed: {0}")]
    QueryError(String),

    #[error("network error: {0}")]
    NetworkError(String),
}

/// Trait for catalog collaborators that supply table metadata per scope.
///
/// A scope is one datasource's namespace; table names are unique within it.
#[async_trait::async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// Adapter name for logs (e.g. "Mock", "MySQL")
    fn name(&self) -> &'static str;

    /// Fetch all table descriptors for a scope
    async fn tables(&self, scope_id: &str) -> Result<Vec<TableDescriptor>, CatalogError>;
}
