//! Catalog collaborator
//!
//! Supplies table descriptors for a datasource scope. The retrieval core
//! treats catalog contents as read-only input, refreshed at a cadence owned
//! by the caller; a retrieval session is built against one snapshot.

pub mod adapter;
pub mod mock;

pub use adapter::{CatalogAdapter, CatalogError};
pub use mock::MockCatalog;
