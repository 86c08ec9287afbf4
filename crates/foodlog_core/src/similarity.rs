//! Cheap name-similarity heuristic over cached food names.
//!
//! # Responsibility
//! - Suggest cached names that likely refer to the same food as a query.
//!
//! # Invariants
//! - Candidates are returned in corpus iteration order, not by score.
//! - Scoring is containment/character overlap, not linguistic matching;
//!   callers treat the output as a single best-effort suggestion.

use std::collections::HashSet;

/// Score assigned when one case-folded string contains the other.
const CONTAINMENT_SCORE: f64 = 0.8;

/// Threshold used by the resolution orchestrator.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Returns every corpus entry scoring at least `threshold` against `name`,
/// in corpus order.
pub fn find_similar(name: &str, corpus: &[String], threshold: f64) -> Vec<String> {
    corpus
        .iter()
        .filter(|candidate| similarity_score(name, candidate) >= threshold)
        .cloned()
        .collect()
}

/// Scores two names in `[0, 1]`.
///
/// Case-folded substring containment scores a flat `0.8`; otherwise the
/// score is the character-set overlap divided by the larger set size.
pub fn similarity_score(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    if a.contains(&b) || b.contains(&a) {
        return CONTAINMENT_SCORE;
    }

    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let larger = set_a.len().max(set_b.len());
    if larger == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / larger as f64
}
