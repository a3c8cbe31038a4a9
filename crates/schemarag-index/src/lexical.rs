//! BM25 lexical index over table descriptor text.

use std::collections::HashMap;

use schemarag_core::TableDescriptor;

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

/// A lexical match with its BM25 score.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub table: String,
    pub score: f32,
}

struct DocEntry {
    table: String,
    term_freq: HashMap<String, usize>,
    len: usize,
}

/// Immutable BM25 index built once per catalog snapshot.
///
/// Documents are the descriptor texts of tables (name, comment, columns),
/// tokenized by splitting on non-alphanumeric characters and lowercasing.
pub struct LexicalIndex {
    docs: Vec<DocEntry>,
    doc_freq: HashMap<String, usize>,
    avg_len: f32,
}

impl LexicalIndex {
    pub fn build(corpus: &[TableDescriptor]) -> Self {
        let mut docs = Vec::with_capacity(corpus.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        for table in corpus {
            let tokens = tokenize(&table.descriptor_text());
            let mut term_freq: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *term_freq.entry(token.clone()).or_insert(0) += 1;
            }
            for term in term_freq.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            total_len += tokens.len();
            docs.push(DocEntry {
                table: table.name.clone(),
                term_freq,
                len: tokens.len(),
            });
        }

        let avg_len = if docs.is_empty() {
            0.0
        } else {
            total_len as f32 / docs.len() as f32
        };

        tracing::debug!(
            tables = docs.len(),
            terms = doc_freq.len(),
            "lexical index built"
        );
        Self {
            docs,
            doc_freq,
            avg_len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Scores every document against `query` and returns the top `limit`
    /// hits with a positive score, ordered by score descending and table
    /// name ascending on ties.
    pub fn search(&self, query: &str, limit: usize) -> Vec<LexicalHit> {
        let terms = tokenize(query);
        if terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }

        let n = self.docs.len() as f32;
        let mut hits: Vec<LexicalHit> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let score = self.score(doc, &terms, n);
                (score > 0.0).then(|| LexicalHit {
                    table: doc.table.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.table.cmp(&b.table))
        });
        hits.truncate(limit);
        hits
    }

    fn score(&self, doc: &DocEntry, terms: &[String], n: f32) -> f32 {
        let mut score = 0.0;
        for term in terms {
            let tf = match doc.term_freq.get(term) {
                Some(&tf) => tf as f32,
                None => continue,
            };
            let df = self.doc_freq.get(term).copied().unwrap_or(0) as f32;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            let norm = 1.0 - BM25_B + BM25_B * doc.len as f32 / self.avg_len;
            score += idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * norm);
        }
        score
    }
}

/// Lowercases and splits on non-alphanumeric boundaries. Underscored
/// identifiers like `order_items` yield both component tokens.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemarag_core::ColumnDescriptor;

    fn table(name: &str, comment: &str, columns: &[(&str, &str)]) -> TableDescriptor {
        TableDescriptor::new(name).with_comment(comment).with_columns(
            columns
                .iter()
                .map(|(col, c)| ColumnDescriptor::new(*col, "varchar").with_comment(*c))
                .collect(),
        )
    }

    fn corpus() -> Vec<TableDescriptor> {
        vec![
            table(
                "orders",
                "customer orders",
                &[("id", "order id"), ("customer_id", "buyer")],
            ),
            table(
                "customers",
                "registered customers",
                &[("id", "customer id"), ("name", "full name")],
            ),
            table("audit_log", "change history", &[("entry", "payload")]),
        ]
    }

    #[test]
    fn query_terms_rank_matching_tables_first() {
        let index = LexicalIndex::build(&corpus());
        let hits = index.search("customer orders", 10);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].table, "orders");
        assert!(hits.iter().any(|h| h.table == "customers"));
        assert!(hits.iter().all(|h| h.table != "audit_log"));
    }

    #[test]
    fn no_matching_terms_yields_empty_result() {
        let index = LexicalIndex::build(&corpus());
        assert!(index.search("warehouse shipments", 10).is_empty());
        assert!(index.search("", 10).is_empty());
    }

    #[test]
    fn limit_truncates_after_ranking() {
        let index = LexicalIndex::build(&corpus());
        let hits = index.search("customer", 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn tied_scores_break_by_table_name() {
        let twins = vec![
            table("zeta", "shared token widget", &[]),
            table("alpha", "shared token widget", &[]),
        ];
        let index = LexicalIndex::build(&twins);
        let hits = index.search("widget", 10);
        assert_eq!(hits[0].table, "alpha");
        assert_eq!(hits[1].table, "zeta");
    }

    #[test]
    fn identifier_components_are_searchable() {
        let index = LexicalIndex::build(&corpus());
        let hits = index.search("log", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].table, "audit_log");
    }

    #[test]
    fn empty_corpus_is_harmless() {
        let index = LexicalIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.search("anything", 10).is_empty());
    }
}
