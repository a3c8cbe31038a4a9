//! Table descriptors, join edges, and retrieval results

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// A column in a table descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,

    /// Raw type string as reported by the source catalog
    #[serde(default)]
    pub data_type: String,

    /// Free-text column comment
    #[serde(default)]
    pub comment: String,
}

impl ColumnDescriptor {
    /// Create a new column descriptor without a comment
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            comment: String::new(),
        }
    }

    /// Set the column comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// A table schema descriptor, keyed by qualified name within a scope.
///
/// Immutable once loaded for a retrieval session; rebuilt when the source
/// catalog changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Qualified table name (unique within a datasource scope)
    pub name: String,

    /// Free-text table comment
    #[serde(default)]
    pub comment: String,

    /// Ordered list of column descriptors
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Create a descriptor with no comment and no columns
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            columns: Vec::new(),
        }
    }

    /// Set the table comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Set the column list
    pub fn with_columns(mut self, columns: Vec<ColumnDescriptor>) -> Self {
        self.columns = columns;
        self
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Concatenated descriptor text used for lexical indexing and as the
    /// candidate text handed to the relevance scorer: table name, table
    /// comment, column names, column comments.
    pub fn descriptor_text(&self) -> String {
        let mut parts = Vec::with_capacity(2 + self.columns.len() * 2);
        parts.push(self.name.as_str());
        if !self.comment.is_empty() {
            parts.push(self.comment.as_str());
        }
        for column in &self.columns {
            parts.push(column.name.as_str());
            if !column.comment.is_empty() {
                parts.push(column.comment.as_str());
            }
        }
        parts.join(" ")
    }
}

/// Join kind read from the JOIN keyword variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    /// Comma joins with WHERE equality, and anything the parser cannot
    /// classify
    Unknown,
}

impl std::fmt::Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inner => write!(f, "INNER"),
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
            Self::Full => write!(f, "FULL"),
            Self::Cross => write!(f, "CROSS"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Originating document/statement identifiers for an extracted edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Provenance {
    /// Origin document identifier (e.g. mapper file id)
    pub document_id: String,

    /// Statement identifier within the document
    pub statement_id: String,
}

impl Provenance {
    pub fn new(document_id: impl Into<String>, statement_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            statement_id: statement_id.into(),
        }
    }
}

/// A directed join relationship between two tables.
///
/// Multiple edges may exist between the same ordered pair with different
/// predicates; edges with the same unordered endpoints and the same
/// normalized predicate are merged, accumulating provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEdge {
    /// Table on the side written first in the equality
    pub from_table: String,

    /// Table on the other side
    pub to_table: String,

    /// Field equality predicate, e.g. `orders.customer_id = customers.id`
    pub predicate: String,

    /// Join kind from the JOIN keyword variant
    pub kind: JoinKind,

    /// Accumulated provenance entries (ordered for determinism)
    pub provenance: BTreeSet<Provenance>,
}

impl JoinEdge {
    /// Create an edge with a single provenance entry
    pub fn new(
        from_table: impl Into<String>,
        to_table: impl Into<String>,
        predicate: impl Into<String>,
        kind: JoinKind,
        provenance: Provenance,
    ) -> Self {
        let mut set = BTreeSet::new();
        set.insert(provenance);
        Self {
            from_table: from_table.into(),
            to_table: to_table.into(),
            predicate: predicate.into(),
            kind,
            provenance: set,
        }
    }

    /// Unordered endpoint pair, lexicographically sorted
    pub fn unordered_pair(&self) -> (&str, &str) {
        if self.from_table <= self.to_table {
            (self.from_table.as_str(), self.to_table.as_str())
        } else {
            (self.to_table.as_str(), self.from_table.as_str())
        }
    }

    /// Predicate normalization used for merge identity: lowercased with all
    /// whitespace removed, so display formatting never splits stored edges.
    pub fn normalized_predicate(&self) -> String {
        self.predicate
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase()
    }

    /// Stable identity key for store-level merge: SHA-256 over the unordered
    /// endpoint pair and the normalized predicate.
    pub fn edge_key(&self) -> String {
        let (a, b) = self.unordered_pair();
        let mut hasher = Sha256::new();
        hasher.update(a.as_bytes());
        hasher.update([0u8]);
        hasher.update(b.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.normalized_predicate().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// All distinct-predicate edges between one unordered table pair.
///
/// `left < right` lexicographically; used for presentation so a pair is
/// reported once regardless of recorded direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeGroup {
    pub left: String,
    pub right: String,
    pub edges: Vec<JoinEdge>,
}

impl EdgeGroup {
    pub fn pair(&self) -> (&str, &str) {
        (self.left.as_str(), self.right.as_str())
    }
}

/// Ephemeral ranking record for one retrieval call; never persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// Table identifier
    pub table: String,

    /// Raw BM25 score (None when absent from the lexical list)
    pub lexical_score: Option<f32>,

    /// Raw cosine similarity (None when absent from the vector list)
    pub vector_score: Option<f32>,

    /// 1-based rank after fusion
    pub fused_rank: usize,

    /// Reciprocal-rank-fusion score
    pub fused_score: f32,

    /// Final rerank score (None when rerank was skipped or degraded)
    pub rerank_score: Option<f32>,
}

/// Final output of one retrieval call: the ranked table subset plus the join
/// edges scoped to those tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    /// Ordered table descriptors, size <= configured top-K
    pub tables: Vec<TableDescriptor>,

    /// Edge groups whose both endpoints appear in `tables`, in canonical
    /// lexicographic pair order
    pub edges: Vec<EdgeGroup>,

    /// False when the precision reranker degraded to fused order
    pub reranked: bool,

    /// False when the relationship store read failed and edge injection was
    /// omitted
    pub edges_resolved: bool,
}

impl RetrievalResult {
    /// A valid empty result (no candidates is an answer, not an error)
    pub fn empty() -> Self {
        Self {
            tables: Vec::new(),
            edges: Vec::new(),
            reranked: false,
            edges_resolved: true,
        }
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_text_concatenates_names_and_comments() {
        let table = TableDescriptor::new("orders")
            .with_comment("customer orders")
            .with_columns(vec![
                ColumnDescriptor::new("id", "bigint"),
                ColumnDescriptor::new("customer_id", "bigint").with_comment("fk to customers"),
            ]);

        let text = table.descriptor_text();
        assert_eq!(text, "orders customer orders id customer_id fk to customers");
    }

    #[test]
    fn join_kind_display() {
        assert_eq!(JoinKind::Left.to_string(), "LEFT");
        assert_eq!(JoinKind::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn edge_key_ignores_direction_and_formatting() {
        let prov = Provenance::new("doc", "stmt");
        let forward = JoinEdge::new(
            "orders",
            "customers",
            "orders.customer_id = customers.id",
            JoinKind::Left,
            prov.clone(),
        );
        let backward = JoinEdge::new(
            "customers",
            "orders",
            "ORDERS.customer_id=CUSTOMERS.id",
            JoinKind::Inner,
            prov,
        );

        assert_eq!(forward.edge_key(), backward.edge_key());
    }

    #[test]
    fn edge_key_distinguishes_predicates() {
        let prov = Provenance::new("doc", "stmt");
        let a = JoinEdge::new(
            "orders",
            "customers",
            "orders.customer_id = customers.id",
            JoinKind::Inner,
            prov.clone(),
        );
        let b = JoinEdge::new(
            "orders",
            "customers",
            "orders.billing_id = customers.id",
            JoinKind::Inner,
            prov,
        );

        assert_ne!(a.edge_key(), b.edge_key());
    }

    #[test]
    fn unordered_pair_is_sorted() {
        let edge = JoinEdge::new(
            "orders",
            "customers",
            "orders.customer_id = customers.id",
            JoinKind::Inner,
            Provenance::new("d", "s"),
        );
        assert_eq!(edge.unordered_pair(), ("customers", "orders"));
    }

    #[test]
    fn empty_result_is_valid() {
        let result = RetrievalResult::empty();
        assert!(result.tables.is_empty());
        assert!(result.edges.is_empty());
        assert!(result.edges_resolved);
    }
}
