//! Order-preserving candidate deduplication.

use std::collections::HashSet;

use carta_core::ScoredId;

/// Collapse duplicate item ids, keeping the first (highest-ranked)
/// occurrence of each. Relative order of survivors is unchanged, so a
/// strategy's ranking passes through intact.
pub fn dedup_keep_first(hits: Vec<ScoredId>) -> Vec<ScoredId> {
    let mut seen = HashSet::with_capacity(hits.len());
    hits.into_iter()
        .filter(|hit| seen.insert(hit.id))
        .collect()
}
