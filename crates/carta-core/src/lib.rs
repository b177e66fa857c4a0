//! # carta-core
//!
//! Core types, traits, and abstractions for the carta menu platform.
//!
//! This crate provides the foundational data structures and trait
//! definitions that other carta crates depend on: catalog models, the
//! pure search-field derivation functions, query types for the hybrid
//! search engine, and the seams to the catalog store and embedding
//! provider.

pub mod error;
pub mod models;
pub mod normalize;
pub mod search;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use normalize::{embedding_document, lexical_document, normalize, DerivedFields};
pub use search::*;
pub use traits::*;

// Re-export the shared vector type so downstream crates agree on it.
pub use pgvector::Vector;
