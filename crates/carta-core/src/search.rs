//! Search query types for the hybrid menu-search engine.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default trigram similarity floor for fuzzy and combined matching.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;

/// Default result count for the semantic fallback and the semantic endpoint.
pub const DEFAULT_SEMANTIC_LIMIT: i64 = 5;

/// Which matching strategy a search request runs.
///
/// `Combined` (the default) is the strict per-word trigram AND; it is the
/// only mode that cascades into the semantic fallback when it finds nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Combined,
    FtsOnly,
    FuzzyOnly,
}

/// Structural constraints applied before any text matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralFilter {
    /// Case-insensitive exact match against an item's subcategory.
    pub dish_type: Option<String>,
    /// Lower price bound, inclusive, against any variation's price.
    pub price_min: Option<f64>,
    /// Upper price bound, inclusive, against any variation's price.
    pub price_max: Option<f64>,
}

impl StructuralFilter {
    /// Whether the filter imposes any constraint at all.
    pub fn is_empty(&self) -> bool {
        self.dish_type.is_none() && self.price_min.is_none() && self.price_max.is_none()
    }
}

/// A menu search request (ephemeral, never persisted).
#[derive(Debug, Clone)]
pub struct MenuQuery {
    /// Free-text query. `None` or blank means "structural filter only".
    pub search: Option<String>,
    pub filter: StructuralFilter,
    /// Fuzzy-match floor in `[0, 1]`.
    pub similarity_threshold: f32,
    pub mode: SearchMode,
    /// Result count for the semantic fallback path.
    pub limit: i64,
}

impl Default for MenuQuery {
    fn default() -> Self {
        Self {
            search: None,
            filter: StructuralFilter::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            mode: SearchMode::default(),
            limit: DEFAULT_SEMANTIC_LIMIT,
        }
    }
}

impl MenuQuery {
    /// Validate caller-supplied parameters. Out-of-range values are
    /// rejected, not clamped.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidInput(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.limit < 1 {
            return Err(Error::InvalidInput(format!(
                "limit must be >= 1, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    /// The trimmed search text, or `None` when the request carries no
    /// usable text (empty after trimming counts as "no search").
    pub fn search_text(&self) -> Option<&str> {
        let text = self.search.as_deref()?.trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// One candidate produced by a strategy: an item id and the relevance
/// score that ranked it (higher is better for every strategy).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredId {
    pub id: i64,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_mode_serde_names() {
        assert_eq!(
            serde_json::to_string(&SearchMode::Combined).unwrap(),
            "\"combined\""
        );
        assert_eq!(
            serde_json::from_str::<SearchMode>("\"fts_only\"").unwrap(),
            SearchMode::FtsOnly
        );
        assert_eq!(
            serde_json::from_str::<SearchMode>("\"fuzzy_only\"").unwrap(),
            SearchMode::FuzzyOnly
        );
    }

    #[test]
    fn test_default_query() {
        let q = MenuQuery::default();
        assert_eq!(q.similarity_threshold, DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(q.limit, DEFAULT_SEMANTIC_LIMIT);
        assert_eq!(q.mode, SearchMode::Combined);
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        for bad in [-0.01_f32, 1.01, 2.0] {
            let q = MenuQuery {
                similarity_threshold: bad,
                ..Default::default()
            };
            assert!(matches!(q.validate(), Err(Error::InvalidInput(_))));
        }
        // Boundaries are valid.
        for ok in [0.0_f32, 1.0] {
            let q = MenuQuery {
                similarity_threshold: ok,
                ..Default::default()
            };
            assert!(q.validate().is_ok());
        }
    }

    #[test]
    fn test_limit_must_be_positive() {
        let q = MenuQuery {
            limit: 0,
            ..Default::default()
        };
        assert!(matches!(q.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_blank_search_is_no_search() {
        let q = MenuQuery {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(q.search_text(), None);

        let q = MenuQuery {
            search: Some(" momo ".to_string()),
            ..Default::default()
        };
        assert_eq!(q.search_text(), Some("momo"));
    }

    #[test]
    fn test_structural_filter_is_empty() {
        assert!(StructuralFilter::default().is_empty());
        assert!(!StructuralFilter {
            price_min: Some(500.0),
            ..Default::default()
        }
        .is_empty());
    }
}
