//! # carta-search
//!
//! Hybrid search cascade for the carta menu catalog.
//!
//! This crate provides:
//! - Matching strategies (lexical, fuzzy, combined, semantic) as small
//!   objects over the `SearchStore` trait
//! - The cascade driver that picks strategies per mode, stops at the
//!   first non-empty result, and hydrates the winners
//! - Order-preserving result deduplication
//!
//! Store-side ranking lives in `carta-db`; this crate only composes it,
//! which keeps the cascade unit-testable without a database.

pub mod dedup;
pub mod engine;
pub mod strategy;

pub use dedup::dedup_keep_first;
pub use engine::MenuSearchEngine;
pub use strategy::{
    CombinedStrategy, FuzzyStrategy, LexicalStrategy, PreparedQuery, SemanticStrategy, Strategy,
};
