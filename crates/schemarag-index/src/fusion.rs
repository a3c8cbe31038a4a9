//! Reciprocal rank fusion of lexical and vector rankings.
//!
//! The lexical pool acts as a gate: vector hits outside the lexical pool
//! are discarded before fusion, so dense similarity can reorder lexical
//! candidates but never introduce tables the lexical index rejected.

use std::collections::{HashMap, HashSet};

use schemarag_core::RetrievalTuning;

use crate::lexical::LexicalHit;
use crate::vector::VectorHit;

#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// How many lexical hits form the candidate pool.
    pub lexical_pool_size: usize,
    /// How many fused candidates survive.
    pub fusion_limit: usize,
    /// RRF dampening constant; larger values flatten rank differences.
    pub rrf_k: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            lexical_pool_size: 50,
            fusion_limit: 20,
            rrf_k: 60.0,
        }
    }
}

impl From<&RetrievalTuning> for FusionConfig {
    fn from(tuning: &RetrievalTuning) -> Self {
        Self {
            lexical_pool_size: tuning.lexical_pool_size,
            fusion_limit: tuning.fusion_limit,
            rrf_k: tuning.rrf_k,
        }
    }
}

/// A table that survived fusion, with its per-signal scores retained
/// for explainability.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub table: String,
    pub lexical_score: Option<f32>,
    pub vector_score: Option<f32>,
    pub fused_score: f32,
}

/// Fuses the two rankings with reciprocal rank fusion over the
/// intersection of the lexical pool and the vector hits.
///
/// Each table in the intersection scores `1/(k + r_lex) + 1/(k + r_vec)`
/// where ranks are 1-based positions within the intersection-restricted
/// rankings. If the intersection is empty the lexical pool is returned
/// as-is, truncated to `fusion_limit`. Ties break by table name so the
/// output is deterministic for a given corpus and query.
pub fn fuse(lexical: &[LexicalHit], vector: &[VectorHit], config: &FusionConfig) -> Vec<FusedCandidate> {
    let pool: Vec<&LexicalHit> = lexical.iter().take(config.lexical_pool_size).collect();
    let pool_tables: HashSet<&str> = pool.iter().map(|h| h.table.as_str()).collect();

    let gated: Vec<&VectorHit> = vector
        .iter()
        .filter(|h| pool_tables.contains(h.table.as_str()))
        .collect();

    if gated.is_empty() {
        // No vector signal inside the pool: fall back to pure lexical
        // order so retrieval still works without an embedding service.
        return pool
            .iter()
            .take(config.fusion_limit)
            .enumerate()
            .map(|(i, hit)| FusedCandidate {
                table: hit.table.clone(),
                lexical_score: Some(hit.score),
                vector_score: None,
                fused_score: 1.0 / (config.rrf_k + (i + 1) as f32),
            })
            .collect();
    }

    let gated_tables: HashSet<&str> = gated.iter().map(|h| h.table.as_str()).collect();

    let lexical_rank: HashMap<&str, usize> = pool
        .iter()
        .filter(|h| gated_tables.contains(h.table.as_str()))
        .enumerate()
        .map(|(i, h)| (h.table.as_str(), i + 1))
        .collect();
    let vector_rank: HashMap<&str, usize> = gated
        .iter()
        .enumerate()
        .map(|(i, h)| (h.table.as_str(), i + 1))
        .collect();

    let lexical_score: HashMap<&str, f32> =
        pool.iter().map(|h| (h.table.as_str(), h.score)).collect();
    let vector_score: HashMap<&str, f32> =
        gated.iter().map(|h| (h.table.as_str(), h.score)).collect();

    let mut fused: Vec<FusedCandidate> = gated
        .iter()
        .map(|hit| {
            let table = hit.table.as_str();
            let r_lex = lexical_rank[table] as f32;
            let r_vec = vector_rank[table] as f32;
            FusedCandidate {
                table: hit.table.clone(),
                lexical_score: lexical_score.get(table).copied(),
                vector_score: vector_score.get(table).copied(),
                fused_score: 1.0 / (config.rrf_k + r_lex) + 1.0 / (config.rrf_k + r_vec),
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.table.cmp(&b.table))
    });
    fused.truncate(config.fusion_limit);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(hits: &[(&str, f32)]) -> Vec<LexicalHit> {
        hits.iter()
            .map(|(t, s)| LexicalHit {
                table: t.to_string(),
                score: *s,
            })
            .collect()
    }

    fn vec_hits(hits: &[(&str, f32)]) -> Vec<VectorHit> {
        hits.iter()
            .map(|(t, s)| VectorHit {
                table: t.to_string(),
                score: *s,
            })
            .collect()
    }

    fn tables(fused: &[FusedCandidate]) -> Vec<&str> {
        fused.iter().map(|c| c.table.as_str()).collect()
    }

    #[test]
    fn vector_hits_outside_the_lexical_pool_are_discarded() {
        let lexical = lex(&[("orders", 3.0), ("customers", 2.0)]);
        let vector = vec_hits(&[("audit_log", 0.99), ("orders", 0.8)]);
        let fused = fuse(&lexical, &vector, &FusionConfig::default());
        assert!(fused.iter().all(|c| c.table != "audit_log"));
        assert_eq!(fused[0].table, "orders");
    }

    #[test]
    fn agreement_across_signals_outranks_a_single_signal() {
        let lexical = lex(&[("a", 5.0), ("b", 4.0), ("c", 3.0)]);
        // Vector ranking inverts b and c; a stays on top of both.
        let vector = vec_hits(&[("a", 0.9), ("c", 0.8), ("b", 0.7)]);
        let fused = fuse(&lexical, &vector, &FusionConfig::default());
        assert_eq!(tables(&fused)[0], "a");
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn empty_intersection_falls_back_to_lexical_order() {
        let lexical = lex(&[("orders", 3.0), ("customers", 2.0)]);
        let vector = vec_hits(&[("audit_log", 0.9)]);
        let fused = fuse(&lexical, &vector, &FusionConfig::default());
        assert_eq!(tables(&fused), vec!["orders", "customers"]);
        assert!(fused.iter().all(|c| c.vector_score.is_none()));
    }

    #[test]
    fn no_vector_hits_at_all_still_returns_lexical_candidates() {
        let lexical = lex(&[("orders", 3.0)]);
        let fused = fuse(&lexical, &[], &FusionConfig::default());
        assert_eq!(tables(&fused), vec!["orders"]);
    }

    #[test]
    fn both_rankings_empty_is_a_valid_empty_result() {
        assert!(fuse(&[], &[], &FusionConfig::default()).is_empty());
    }

    #[test]
    fn fusion_limit_truncates_the_fused_list() {
        let lexical = lex(&[("a", 5.0), ("b", 4.0), ("c", 3.0)]);
        let vector = vec_hits(&[("a", 0.9), ("b", 0.8), ("c", 0.7)]);
        let config = FusionConfig {
            fusion_limit: 2,
            ..FusionConfig::default()
        };
        let fused = fuse(&lexical, &vector, &config);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn lexical_pool_size_gates_before_fusion() {
        let lexical = lex(&[("a", 5.0), ("b", 4.0), ("c", 3.0)]);
        let vector = vec_hits(&[("c", 0.9), ("a", 0.8)]);
        let config = FusionConfig {
            lexical_pool_size: 2,
            ..FusionConfig::default()
        };
        // "c" is lexically ranked third so it never enters the pool.
        let fused = fuse(&lexical, &vector, &config);
        assert!(fused.iter().all(|c| c.table != "c"));
    }

    #[test]
    fn tied_fused_scores_break_by_table_name() {
        // Two tables that swap ranks across the signals score equally.
        let lexical = lex(&[("zeta", 2.0), ("alpha", 1.0)]);
        let vector = vec_hits(&[("alpha", 0.9), ("zeta", 0.8)]);
        let fused = fuse(&lexical, &vector, &FusionConfig::default());
        assert_eq!(tables(&fused), vec!["alpha", "zeta"]);
    }

    #[test]
    fn per_signal_scores_are_retained() {
        let lexical = lex(&[("orders", 3.5)]);
        let vector = vec_hits(&[("orders", 0.91)]);
        let fused = fuse(&lexical, &vector, &FusionConfig::default());
        assert_eq!(fused[0].lexical_score, Some(3.5));
        assert_eq!(fused[0].vector_score, Some(0.91));
    }
}
