//! Mapper ingestion: normalize, parse, extract, persist.
//!
//! Ingestion is batch-tolerant: a statement that fails normalization or
//! parsing is recorded in the report and skipped, never aborting the
//! batch. Extracted edges are written to the relation store in one
//! best-effort upsert at the end.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use schemarag_core::{IngestIssue, IngestReport, IssueCode, JoinEdge, Provenance};
use schemarag_sql::{extract_join_edges, normalize, SqlParser};
use schemarag_store::RelationStore;

/// One templated SQL statement from a mapper document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatement {
    /// Statement identifier within the document
    pub id: String,

    /// Raw statement body, possibly containing dynamic-SQL markup
    pub sql: String,
}

/// One mapper document with its statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSource {
    /// Document identifier (e.g. mapper namespace or file stem)
    pub document_id: String,

    #[serde(default)]
    pub statements: Vec<RawStatement>,
}

/// Runs the extraction pipeline over `documents` and persists the edges.
pub async fn extract_and_store(
    documents: &[DocumentSource],
    parser: &SqlParser,
    store: &dyn RelationStore,
) -> IngestReport {
    let mut report = IngestReport {
        documents: documents.len(),
        ..Default::default()
    };
    let mut edges: Vec<JoinEdge> = Vec::new();

    for document in documents {
        for statement in &document.statements {
            report.statements += 1;
            let normalized = match normalize(&statement.sql) {
                Ok(n) => n,
                Err(e) => {
                    report.record(IngestIssue::for_statement(
                        IssueCode::MalformedStatement,
                        document.document_id.as_str(),
                        statement.id.as_str(),
                        e.to_string(),
                    ));
                    continue;
                }
            };
            let parsed = match parser.parse(&normalized.sql) {
                Ok(p) => p,
                Err(e) => {
                    report.record(IngestIssue::for_statement(
                        IssueCode::ParseSkipped,
                        document.document_id.as_str(),
                        statement.id.as_str(),
                        e.to_string(),
                    ));
                    continue;
                }
            };
            let provenance =
                Provenance::new(document.document_id.as_str(), statement.id.as_str());
            let extracted = extract_join_edges(&parsed, &provenance);
            report.edges_extracted += extracted.len();
            edges.extend(extracted);
        }
    }

    debug!(
        documents = report.documents,
        statements = report.statements,
        edges = report.edges_extracted,
        "extraction finished"
    );

    if edges.is_empty() {
        return report;
    }
    match store.upsert(edges).await {
        Ok(upsert) => report.upsert = upsert,
        Err(e) => {
            warn!(error = %e, "relation store write failed, edges not persisted");
            report.record(IngestIssue::new(IssueCode::StoreWriteFailed, e.to_string()));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemarag_store::InMemoryRelationStore;

    fn document(statements: &[(&str, &str)]) -> DocumentSource {
        DocumentSource {
            document_id: "order_mapper".to_string(),
            statements: statements
                .iter()
                .map(|(id, sql)| RawStatement {
                    id: id.to_string(),
                    sql: sql.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn clean_statement_produces_persisted_edges() {
        let store = InMemoryRelationStore::new();
        let parser = SqlParser::mysql();
        let docs = vec![document(&[(
            "selectWithCustomer",
            "SELECT o.id FROM orders o LEFT JOIN customers c ON o.customer_id = c.id",
        )])];

        let report = extract_and_store(&docs, &parser, &store).await;
        assert_eq!(report.statements, 1);
        assert_eq!(report.edges_extracted, 1);
        assert_eq!(report.upsert.inserted, 1);
        assert!(!report.store_write_failed);
        assert_eq!(store.edge_count().await, 1);
    }

    #[tokio::test]
    async fn bad_statements_are_counted_not_fatal() {
        let store = InMemoryRelationStore::new();
        let parser = SqlParser::mysql();
        let docs = vec![document(&[
            ("unbalanced", "SELECT * FROM orders WHERE (id = #{id}"),
            ("unparseable", "SELECT o.id, FROM orders o"),
            (
                "good",
                "SELECT o.id FROM orders o JOIN customers c ON o.customer_id = c.id",
            ),
        ])];

        let report = extract_and_store(&docs, &parser, &store).await;
        assert_eq!(report.malformed, 1);
        assert_eq!(report.parse_skipped, 1);
        assert_eq!(report.edges_extracted, 1);
        assert_eq!(report.issues.len(), 2);
        assert_eq!(store.edge_count().await, 1);
    }

    #[tokio::test]
    async fn store_write_failure_is_reported() {
        let store = InMemoryRelationStore::new().with_write_failure();
        let parser = SqlParser::mysql();
        let docs = vec![document(&[(
            "good",
            "SELECT o.id FROM orders o JOIN customers c ON o.customer_id = c.id",
        )])];

        let report = extract_and_store(&docs, &parser, &store).await;
        assert!(report.store_write_failed);
        assert_eq!(report.upsert.total(), 0);
        assert_eq!(report.edges_extracted, 1);
    }

    #[tokio::test]
    async fn statement_with_no_joins_is_not_an_issue() {
        let store = InMemoryRelationStore::new();
        let parser = SqlParser::mysql();
        let docs = vec![document(&[("byId", "SELECT * FROM orders WHERE id = ?")])];

        let report = extract_and_store(&docs, &parser, &store).await;
        assert_eq!(report.statements, 1);
        assert_eq!(report.edges_extracted, 0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn document_source_round_trips_through_json() {
        let json = r#"{
            "document_id": "order_mapper",
            "statements": [{"id": "byId", "sql": "SELECT * FROM orders"}]
        }"#;
        let parsed: DocumentSource = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.document_id, "order_mapper");
        assert_eq!(parsed.statements.len(), 1);
    }
}
