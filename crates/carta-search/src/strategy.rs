//! Matching strategies the cascade composes.
//!
//! Each strategy answers one question: "which items does this query match,
//! and how strongly?" The engine decides which strategies run and in what
//! order; strategies themselves are stateless except for the semantic one,
//! which holds the embedding backend.

use std::sync::Arc;

use async_trait::async_trait;

use carta_core::{
    normalize, EmbeddingBackend, Error, Result, ScoredId, SearchStore, StructuralFilter,
};

/// A search request after text preparation, shared by every strategy.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    /// Trimmed query text as the caller wrote it.
    pub text: String,
    /// Normalized (lowercased, trimmed) query text.
    pub text_norm: String,
    /// Whitespace-split words of the normalized text.
    pub words: Vec<String>,
    pub filter: StructuralFilter,
    pub threshold: f32,
    pub limit: i64,
}

impl PreparedQuery {
    pub fn new(text: &str, filter: StructuralFilter, threshold: f32, limit: i64) -> Self {
        let text_norm = normalize(Some(text)).unwrap_or_default();
        let words = text_norm.split_whitespace().map(str::to_string).collect();
        Self {
            text: text.to_string(),
            text_norm,
            words,
            filter,
            threshold,
            limit,
        }
    }
}

/// One rung of the cascade.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    async fn run(&self, store: &dyn SearchStore, query: &PreparedQuery) -> Result<Vec<ScoredId>>;
}

/// Full-text match over the precomputed lexical index. Multi-word queries
/// are an implicit AND; `OR` between terms is honored.
pub struct LexicalStrategy;

#[async_trait]
impl Strategy for LexicalStrategy {
    fn name(&self) -> &'static str {
        "lexical"
    }

    async fn run(&self, store: &dyn SearchStore, query: &PreparedQuery) -> Result<Vec<ScoredId>> {
        store.lexical_match(&query.text, &query.filter).await
    }
}

/// Whole-query trigram match against item name or category name. Catches
/// typos a token-exact lexical match cannot ("mmoo" for "momo").
pub struct FuzzyStrategy;

#[async_trait]
impl Strategy for FuzzyStrategy {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    async fn run(&self, store: &dyn SearchStore, query: &PreparedQuery) -> Result<Vec<ScoredId>> {
        store
            .fuzzy_match(&query.text_norm, query.threshold, &query.filter)
            .await
    }
}

/// Per-word trigram match: every word must clear the threshold against the
/// same field. Keeps "chicken momo" from matching plain "momo" items the
/// way a whole-query fuzzy match would.
pub struct CombinedStrategy;

#[async_trait]
impl Strategy for CombinedStrategy {
    fn name(&self) -> &'static str {
        "combined"
    }

    async fn run(&self, store: &dyn SearchStore, query: &PreparedQuery) -> Result<Vec<ScoredId>> {
        store
            .combined_match(&query.words, query.threshold, &query.filter)
            .await
    }
}

/// Meaning-based nearest-neighbour match over the dense embeddings. The
/// last resort of the cascade; a backend failure here is an error, not an
/// empty result.
pub struct SemanticStrategy {
    backend: Arc<dyn EmbeddingBackend>,
}

impl SemanticStrategy {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Strategy for SemanticStrategy {
    fn name(&self) -> &'static str {
        "semantic"
    }

    async fn run(&self, store: &dyn SearchStore, query: &PreparedQuery) -> Result<Vec<ScoredId>> {
        let vectors = self.backend.embed_texts(&[query.text.clone()]).await?;
        let embedding = vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("backend returned no vectors".to_string()))?;

        store
            .semantic_match(&embedding, query.limit, &query.filter)
            .await
    }
}
