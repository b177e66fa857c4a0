//! Core traits for carta abstractions.
//!
//! These traits define the seams between the search engine and its
//! collaborators (catalog store, embedding provider), enabling pluggable
//! backends and testability.

use async_trait::async_trait;
use pgvector::Vector;

use crate::error::Result;
use crate::models::ItemFull;
use crate::search::{ScoredId, StructuralFilter};

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
///
/// Implementations load or connect to their model once; a single instance
/// is built at process start and shared by handle (`Arc`) for the life of
/// the process. Encoding must be deterministic for a fixed model: the same
/// text always yields the same vector.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// SEARCH STORE TRAIT
// =============================================================================

/// Store-side search primitives the hybrid engine composes.
///
/// Lexical ranking, trigram similarity, and vector distance are properties
/// of the storage engine; the trait exposes them as ranked-id queries so
/// the cascade logic (and its tests) stay independent of SQL. Every method
/// applies the structural filter before matching, and breaks score ties by
/// item id ascending for deterministic ordering.
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Items passing the structural filter alone, name ascending.
    /// The default ordering when no search text is supplied.
    async fn filter_default_order(&self, filter: &StructuralFilter) -> Result<Vec<i64>>;

    /// Lexical full-text match: multi-word queries are an implicit AND of
    /// terms; ranked by the store's relevance score, descending.
    async fn lexical_match(
        &self,
        query: &str,
        filter: &StructuralFilter,
    ) -> Result<Vec<ScoredId>>;

    /// Whole-query trigram match against `name_norm` OR
    /// `category_name_norm`; score is the greater similarity. Only items
    /// strictly above `threshold` match.
    async fn fuzzy_match(
        &self,
        query_norm: &str,
        threshold: f32,
        filter: &StructuralFilter,
    ) -> Result<Vec<ScoredId>>;

    /// Per-word trigram match: every word must exceed `threshold` against
    /// `name_norm`, or every word against `category_name_norm`. Score is
    /// the greater of the two per-word similarity averages.
    async fn combined_match(
        &self,
        words: &[String],
        threshold: f32,
        filter: &StructuralFilter,
    ) -> Result<Vec<ScoredId>>;

    /// Nearest neighbours by cosine distance to `embedding`, closest
    /// first, at most `limit`. Items without a computed embedding are
    /// excluded, never an error. Score is cosine similarity.
    async fn semantic_match(
        &self,
        embedding: &Vector,
        limit: i64,
        filter: &StructuralFilter,
    ) -> Result<Vec<ScoredId>>;

    /// Fetch full records (category name resolved, variations attached)
    /// for the given ids, in the given order. Unknown ids are skipped.
    async fn hydrate(&self, ids: &[i64]) -> Result<Vec<ItemFull>>;
}
