//! # carta-inference
//!
//! Embedding backend abstraction for carta.
//!
//! This crate provides:
//! - The Ollama embedding backend (default)
//! - A deterministic mock backend for tests (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `mock`: Enable the mock backend
//! - `integration`: Enable tests that require a live Ollama server
//!
//! # Example
//!
//! ```rust,no_run
//! use carta_inference::OllamaBackend;
//! use carta_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env().unwrap();
//!     let texts = vec!["Steamed Momo".to_string()];
//!     let embeddings = backend.embed_texts(&texts).await.unwrap();
//! }
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaBackend, DEFAULT_EMBED_MODEL, DEFAULT_OLLAMA_URL};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbeddingBackend;

// Re-export the trait consumers implement against.
pub use carta_core::EmbeddingBackend;
