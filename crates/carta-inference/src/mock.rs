//! Mock embedding backend for deterministic testing.
//!
//! Generates reproducible vectors from text content alone, so search
//! tests can exercise the semantic path without a live model server.

use std::sync::Mutex;

use async_trait::async_trait;

use carta_core::{EmbeddingBackend, Error, Result, Vector};

/// Mock embedding backend for testing.
pub struct MockEmbeddingBackend {
    dimension: usize,
    fail: Mutex<bool>,
}

impl MockEmbeddingBackend {
    /// Create a new mock backend with the default 384 dimensions.
    pub fn new() -> Self {
        Self::with_dimension(384)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            fail: Mutex::new(false),
        }
    }

    /// Make subsequent embed calls fail, simulating a provider outage.
    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }

    /// Generate a deterministic embedding from text.
    ///
    /// Uses character-based hashing for reproducibility. The same text
    /// always produces the same unit vector.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension];

        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }

        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        vec
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if *self.fail.lock().unwrap() {
            return Err(Error::Embedding("mock backend set to fail".to_string()));
        }
        Ok(texts
            .iter()
            .map(|text| Vector::from(Self::generate(text, self.dimension)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}
