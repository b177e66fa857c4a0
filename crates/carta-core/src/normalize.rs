//! Pure derivation functions for item search fields.
//!
//! Every derived column in the catalog is a function of the item's current
//! source fields. Keeping these as pure `(source) -> derived` functions
//! means the write path, the backfill sweep, and the staleness checks all
//! share one definition of "fresh".

/// Normalize a text field for search: lowercase and trim.
///
/// An empty string after trimming is represented as `None`, never as an
/// empty string. Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: Option<&str>) -> Option<String> {
    let trimmed = text?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Source text for the lexical search vector: the three normalized fields,
/// space-joined, nulls treated as empty.
///
/// The store derives `tsv = to_tsvector('simple', lexical_document(...))`
/// from this; the text itself is never persisted.
pub fn lexical_document(
    name_norm: Option<&str>,
    description_norm: Option<&str>,
    category_name_norm: Option<&str>,
) -> String {
    [name_norm, description_norm, category_name_norm]
        .iter()
        .map(|f| f.unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compose the document string an item's dense embedding is computed from.
///
/// Deterministic: identical inputs always produce the identical document,
/// so a fixed model yields a fixed vector.
pub fn embedding_document(
    name: &str,
    description: Option<&str>,
    category_name: &str,
    subcategory: Option<&str>,
) -> String {
    format!(
        "Name: {}. Description: {}. Category: {}. Subcategory: {}.",
        name,
        description.unwrap_or(""),
        category_name,
        subcategory.unwrap_or(""),
    )
}

/// The derived text columns for one item, computed from source fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedFields {
    pub name_norm: Option<String>,
    pub description_norm: Option<String>,
    pub category_name_norm: Option<String>,
}

impl DerivedFields {
    /// Compute all normalized columns from the item's current source fields.
    pub fn compute(name: &str, description: Option<&str>, category_name: &str) -> Self {
        Self {
            name_norm: normalize(Some(name)),
            description_norm: normalize(description),
            category_name_norm: normalize(Some(category_name)),
        }
    }

    /// Source text for the lexical vector of these fields.
    pub fn lexical_document(&self) -> String {
        lexical_document(
            self.name_norm.as_deref(),
            self.description_norm.as_deref(),
            self.category_name_norm.as_deref(),
        )
    }
}
