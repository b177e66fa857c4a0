//! The cascade driver.
//!
//! The engine prepares the query text once, picks an ordered strategy list
//! for the requested mode, and runs strategies in priority order until one
//! returns candidates. Only the default combined mode carries the semantic
//! fallback; fts_only and fuzzy_only are single-strategy by design. Zero
//! candidates everywhere is an empty result, but a strategy error (store
//! or embedding backend) is never flattened into an empty result.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use carta_core::{
    EmbeddingBackend, Error, ItemFull, MenuQuery, Result, SearchMode, SearchStore,
};

use crate::dedup::dedup_keep_first;
use crate::strategy::{
    CombinedStrategy, FuzzyStrategy, LexicalStrategy, PreparedQuery, SemanticStrategy, Strategy,
};

/// Hybrid menu-search engine over a search store and an embedding backend.
///
/// One instance is built at process start and shared across requests; the
/// embedding backend in particular must not be re-initialized per call.
pub struct MenuSearchEngine<S: SearchStore> {
    store: Arc<S>,
    embedder: Arc<dyn EmbeddingBackend>,
}

impl<S: SearchStore> MenuSearchEngine<S> {
    pub fn new(store: Arc<S>, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self { store, embedder }
    }

    /// Run a search request end to end: validate, match, dedup, hydrate.
    pub async fn search(&self, query: &MenuQuery) -> Result<Vec<ItemFull>> {
        query.validate()?;

        let text = match query.search_text() {
            Some(text) => text,
            None => {
                // No usable text: the structural filter alone decides,
                // name ascending.
                let ids = self.store.filter_default_order(&query.filter).await?;
                return self.store.hydrate(&ids).await;
            }
        };

        let prepared = PreparedQuery::new(
            text,
            query.filter.clone(),
            query.similarity_threshold,
            query.limit,
        );

        let strategies: Vec<Box<dyn Strategy>> = match query.mode {
            SearchMode::FtsOnly => vec![Box::new(LexicalStrategy)],
            SearchMode::FuzzyOnly => vec![Box::new(FuzzyStrategy)],
            SearchMode::Combined => vec![
                Box::new(CombinedStrategy),
                Box::new(SemanticStrategy::new(self.embedder.clone())),
            ],
        };

        for strategy in &strategies {
            let start = Instant::now();
            let hits = strategy.run(self.store.as_ref(), &prepared).await?;
            debug!(
                subsystem = "search",
                strategy = strategy.name(),
                hit_count = hits.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Strategy evaluated"
            );

            if !hits.is_empty() {
                let deduped = dedup_keep_first(hits);
                let ids: Vec<i64> = deduped.iter().map(|hit| hit.id).collect();
                return self.store.hydrate(&ids).await;
            }
        }

        Ok(Vec::new())
    }

    /// Pure vector search for direct callers: embed the text and return the
    /// nearest items, no lexical or fuzzy pass and no structural filter.
    pub async fn semantic_search(&self, text: &str, limit: i64) -> Result<Vec<ItemFull>> {
        if limit < 1 {
            return Err(Error::InvalidInput(format!(
                "limit must be >= 1, got {}",
                limit
            )));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput(
                "query text must not be empty".to_string(),
            ));
        }

        let prepared = PreparedQuery::new(text, Default::default(), 0.0, limit);
        let strategy = SemanticStrategy::new(self.embedder.clone());
        let hits = strategy.run(self.store.as_ref(), &prepared).await?;
        let ids: Vec<i64> = dedup_keep_first(hits).iter().map(|hit| hit.id).collect();
        self.store.hydrate(&ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use pgvector::Vector;

    use carta_core::{ScoredId, StructuralFilter};
    use carta_inference::MockEmbeddingBackend;

    /// In-memory store with canned per-method results and a call log.
    #[derive(Default)]
    struct FakeStore {
        lexical: Vec<ScoredId>,
        fuzzy: Vec<ScoredId>,
        combined: Vec<ScoredId>,
        semantic: Vec<ScoredId>,
        unfiltered: Vec<i64>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeStore {
        fn log(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn hits(ids: &[i64]) -> Vec<ScoredId> {
        ids.iter()
            .enumerate()
            .map(|(rank, &id)| ScoredId {
                id,
                score: 1.0 - rank as f32 * 0.1,
            })
            .collect()
    }

    fn full(id: i64) -> ItemFull {
        ItemFull {
            id,
            category_id: 1,
            category_name: "Starters".to_string(),
            subcategory: None,
            name: format!("Item {}", id),
            description: None,
            is_available: true,
            variations: Vec::new(),
        }
    }

    #[async_trait]
    impl SearchStore for FakeStore {
        async fn filter_default_order(&self, _filter: &StructuralFilter) -> Result<Vec<i64>> {
            self.log("filter_default_order");
            Ok(self.unfiltered.clone())
        }

        async fn lexical_match(
            &self,
            _query: &str,
            _filter: &StructuralFilter,
        ) -> Result<Vec<ScoredId>> {
            self.log("lexical");
            Ok(self.lexical.clone())
        }

        async fn fuzzy_match(
            &self,
            _query_norm: &str,
            _threshold: f32,
            _filter: &StructuralFilter,
        ) -> Result<Vec<ScoredId>> {
            self.log("fuzzy");
            Ok(self.fuzzy.clone())
        }

        async fn combined_match(
            &self,
            _words: &[String],
            _threshold: f32,
            _filter: &StructuralFilter,
        ) -> Result<Vec<ScoredId>> {
            self.log("combined");
            Ok(self.combined.clone())
        }

        async fn semantic_match(
            &self,
            _embedding: &Vector,
            limit: i64,
            _filter: &StructuralFilter,
        ) -> Result<Vec<ScoredId>> {
            self.log("semantic");
            Ok(self.semantic.iter().take(limit as usize).copied().collect())
        }

        async fn hydrate(&self, ids: &[i64]) -> Result<Vec<ItemFull>> {
            self.log("hydrate");
            Ok(ids.iter().map(|&id| full(id)).collect())
        }
    }

    fn engine(store: FakeStore) -> MenuSearchEngine<FakeStore> {
        MenuSearchEngine::new(Arc::new(store), Arc::new(MockEmbeddingBackend::new()))
    }

    fn query(text: &str, mode: SearchMode) -> MenuQuery {
        MenuQuery {
            search: Some(text.to_string()),
            mode,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_no_text_uses_default_order() {
        let store = FakeStore {
            unfiltered: vec![3, 1, 2],
            ..Default::default()
        };
        let engine = engine(store);

        let results = engine.search(&MenuQuery::default()).await.unwrap();
        assert_eq!(results.iter().map(|i| i.id).collect::<Vec<_>>(), vec![3, 1, 2]);

        let blank = MenuQuery {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(engine.search(&blank).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_combined_hit_skips_fallback() {
        let store = FakeStore {
            combined: hits(&[2]),
            semantic: hits(&[9]),
            ..Default::default()
        };
        let engine = engine(store);

        let results = engine
            .search(&query("chicken momo", SearchMode::Combined))
            .await
            .unwrap();
        assert_eq!(results.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(engine.store.calls(), vec!["combined", "hydrate"]);
    }

    #[tokio::test]
    async fn test_combined_empty_falls_back_to_semantic() {
        let store = FakeStore {
            semantic: hits(&[7, 4]),
            ..Default::default()
        };
        let engine = engine(store);

        let results = engine
            .search(&query("tortilla", SearchMode::Combined))
            .await
            .unwrap();
        assert_eq!(results.iter().map(|i| i.id).collect::<Vec<_>>(), vec![7, 4]);
        assert_eq!(engine.store.calls(), vec!["combined", "semantic", "hydrate"]);
    }

    #[tokio::test]
    async fn test_single_strategy_modes_never_fall_back() {
        let store = FakeStore {
            semantic: hits(&[9]),
            ..Default::default()
        };
        let engine = engine(store);

        let results = engine
            .search(&query("mmoo", SearchMode::FuzzyOnly))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(engine.store.calls(), vec!["fuzzy"]);

        let results = engine
            .search(&query("momo", SearchMode::FtsOnly))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(engine.store.calls(), vec!["fuzzy", "lexical"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_collapse_to_first() {
        let store = FakeStore {
            combined: vec![
                ScoredId { id: 5, score: 0.9 },
                ScoredId { id: 2, score: 0.8 },
                ScoredId { id: 5, score: 0.4 },
            ],
            ..Default::default()
        };
        let engine = engine(store);

        let results = engine
            .search(&query("momo", SearchMode::Combined))
            .await
            .unwrap();
        assert_eq!(results.iter().map(|i| i.id).collect::<Vec<_>>(), vec![5, 2]);
    }

    #[tokio::test]
    async fn test_invalid_threshold_rejected_before_store() {
        let store = FakeStore::default();
        let engine = engine(store);

        let bad = MenuQuery {
            search: Some("momo".to_string()),
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            engine.search(&bad).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(engine.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let store = FakeStore::default();
        let backend = Arc::new(MockEmbeddingBackend::new());
        backend.set_failing(true);
        let engine = MenuSearchEngine::new(Arc::new(store), backend);

        // Combined finds nothing, so the fallback runs and surfaces the
        // backend error instead of reporting a hollow empty result.
        let result = engine.search(&query("tortilla", SearchMode::Combined)).await;
        assert!(matches!(result, Err(Error::Embedding(_))));
    }

    #[tokio::test]
    async fn test_semantic_endpoint_validates_input() {
        let engine = engine(FakeStore {
            semantic: hits(&[1]),
            ..Default::default()
        });

        assert!(engine.semantic_search("  ", 5).await.is_err());
        assert!(engine.semantic_search("momo", 0).await.is_err());

        let results = engine.semantic_search("momo", 5).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_semantic_limit_respected() {
        let engine = engine(FakeStore {
            semantic: hits(&[1, 2, 3, 4]),
            ..Default::default()
        });
        let results = engine.semantic_search("momo", 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
