//! Ingestion and upsert reports
//!
//! Issue codes are STABLE identifiers consumed by callers and dashboards.
//! Do NOT rename or remove codes - only add new ones.

use serde::{Deserialize, Serialize};

/// Stable issue code registry (v1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// Normalization could not produce balanced SQL; statement skipped
    MalformedStatement,

    /// Normalized SQL failed to parse; statement produced zero edges
    ParseSkipped,

    /// Relation store rejected the batch write; edges remain recoverable by
    /// re-running extraction
    StoreWriteFailed,
}

impl IssueCode {
    /// Stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedStatement => "MALFORMED_STATEMENT",
            Self::ParseSkipped => "PARSE_SKIPPED",
            Self::StoreWriteFailed => "STORE_WRITE_FAILED",
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One sampled ingestion issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestIssue {
    pub code: IssueCode,

    /// Origin document identifier, when the issue is statement-scoped
    pub document_id: Option<String>,

    /// Statement identifier within the document
    pub statement_id: Option<String>,

    /// Human-readable detail
    pub message: String,
}

impl IngestIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            document_id: None,
            statement_id: None,
            message: message.into(),
        }
    }

    pub fn for_statement(
        code: IssueCode,
        document_id: impl Into<String>,
        statement_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            document_id: Some(document_id.into()),
            statement_id: Some(statement_id.into()),
            message: message.into(),
        }
    }
}

/// Counts reported by a relation-store upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertReport {
    /// Edges inserted as new records
    pub inserted: usize,

    /// Edges merged into existing records (provenance accumulated)
    pub merged: usize,
}

impl UpsertReport {
    pub fn total(&self) -> usize {
        self.inserted + self.merged
    }
}

/// Aggregated outcome of one ingestion batch.
///
/// Ingestion-time errors are aggregated as counts plus a capped sample list;
/// a single bad statement never aborts the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Documents processed
    pub documents: usize,

    /// Statements processed
    pub statements: usize,

    /// Edges extracted before store-level dedup
    pub edges_extracted: usize,

    /// Statements dropped at normalization
    pub malformed: usize,

    /// Statements dropped at parse
    pub parse_skipped: usize,

    /// True when the store write failed and edges were not persisted
    pub store_write_failed: bool,

    /// Store counts (zeroed when the write failed)
    pub upsert: UpsertReport,

    /// Sampled issues, capped at [`IngestReport::MAX_ISSUE_SAMPLES`]
    pub issues: Vec<IngestIssue>,
}

impl IngestReport {
    /// Cap on sampled issues kept per batch
    pub const MAX_ISSUE_SAMPLES: usize = 32;

    /// Record an issue, bumping the matching counter and sampling the detail
    pub fn record(&mut self, issue: IngestIssue) {
        match issue.code {
            IssueCode::MalformedStatement => self.malformed += 1,
            IssueCode::ParseSkipped => self.parse_skipped += 1,
            IssueCode::StoreWriteFailed => self.store_write_failed = true,
        }
        if self.issues.len() < Self::MAX_ISSUE_SAMPLES {
            self.issues.push(issue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_code_stability() {
        assert_eq!(IssueCode::MalformedStatement.as_str(), "MALFORMED_STATEMENT");
        assert_eq!(IssueCode::ParseSkipped.as_str(), "PARSE_SKIPPED");
        assert_eq!(IssueCode::StoreWriteFailed.as_str(), "STORE_WRITE_FAILED");
    }

    #[test]
    fn record_bumps_counters_and_samples() {
        let mut report = IngestReport::default();
        report.record(IngestIssue::for_statement(
            IssueCode::ParseSkipped,
            "mapper_a",
            "selectOrders",
            "unsupported syntax",
        ));
        report.record(IngestIssue::new(IssueCode::StoreWriteFailed, "store down"));

        assert_eq!(report.parse_skipped, 1);
        assert!(report.store_write_failed);
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn issue_samples_are_capped() {
        let mut report = IngestReport::default();
        for i in 0..IngestReport::MAX_ISSUE_SAMPLES + 10 {
            report.record(IngestIssue::new(
                IssueCode::ParseSkipped,
                format!("issue {i}"),
            ));
        }

        assert_eq!(report.parse_skipped, IngestReport::MAX_ISSUE_SAMPLES + 10);
        assert_eq!(report.issues.len(), IngestReport::MAX_ISSUE_SAMPLES);
    }

    #[test]
    fn report_serialization() {
        let mut report = IngestReport::default();
        report.record(IngestIssue::new(IssueCode::MalformedStatement, "unbalanced"));
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("MALFORMED_STATEMENT"));
    }
}
