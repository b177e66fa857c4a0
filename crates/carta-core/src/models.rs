//! Core data models for carta.
//!
//! These types are shared across all carta crates and represent the
//! catalog domain entities.

use serde::{Deserialize, Serialize};

// =============================================================================
// CATALOG TYPES
// =============================================================================

/// A named grouping of menu items. Names are unique across the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A sellable menu entry, including the derived search fields.
///
/// The derived fields (`name_norm`, `description_norm`, `category_name_norm`,
/// plus the store-side `tsv` and `emb` columns) are nullable until the
/// indexing pipeline populates them. They must always reflect the current
/// source fields; writes recompute them in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub category_id: i64,
    pub subcategory: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub is_available: bool,
    pub name_norm: Option<String>,
    pub description_norm: Option<String>,
    pub category_name_norm: Option<String>,
}

/// A priced variant of an item (e.g. "regular", "large").
/// Unique per `(item_id, label)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceVariation {
    pub id: i64,
    pub item_id: i64,
    pub label: String,
    pub final_price: f64,
    pub is_available: bool,
}

/// Externally visible variation shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationOut {
    pub id: i64,
    pub label: String,
    pub final_price: f64,
    pub is_available: bool,
}

/// Fully hydrated item: category name resolved, variations attached.
///
/// This is the shape the search engine emits and the API serializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFull {
    pub id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub subcategory: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub is_available: bool,
    pub variations: Vec<VariationOut>,
}

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Request for creating a new item.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateItemRequest {
    pub category_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub subcategory: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

/// Partial update of an item. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItemRequest {
    pub category_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub subcategory: Option<String>,
    pub is_available: Option<bool>,
}

impl UpdateItemRequest {
    /// Whether this update touches a field the derived search columns
    /// are computed from.
    pub fn touches_source_fields(&self) -> bool {
        self.category_id.is_some()
            || self.name.is_some()
            || self.description.is_some()
            || self.subcategory.is_some()
    }

    /// Whether the update carries no changes at all.
    pub fn is_empty(&self) -> bool {
        !self.touches_source_fields() && self.is_available.is_none()
    }
}

/// Request for creating a price variation under an item.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVariationRequest {
    pub label: String,
    pub final_price: f64,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

/// Partial update of a price variation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVariationRequest {
    pub label: Option<String>,
    pub final_price: Option<f64>,
    pub is_available: Option<bool>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_item_touches_source_fields() {
        let req = UpdateItemRequest {
            name: Some("Veg Momo".to_string()),
            ..Default::default()
        };
        assert!(req.touches_source_fields());

        let req = UpdateItemRequest {
            is_available: Some(false),
            ..Default::default()
        };
        assert!(!req.touches_source_fields());
        assert!(!req.is_empty());

        assert!(UpdateItemRequest::default().is_empty());
    }

    #[test]
    fn test_create_item_default_availability() {
        let req: CreateItemRequest =
            serde_json::from_str(r#"{"category_id": 1, "name": "Veg Momo"}"#).unwrap();
        assert!(req.is_available);
        assert!(req.description.is_none());
    }

    #[test]
    fn test_item_full_serializes_variations() {
        let item = ItemFull {
            id: 1,
            category_id: 2,
            category_name: "Starters".to_string(),
            subcategory: Some("veg".to_string()),
            name: "Veg Momo".to_string(),
            description: None,
            is_available: true,
            variations: vec![VariationOut {
                id: 10,
                label: "regular".to_string(),
                final_price: 250.0,
                is_available: true,
            }],
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["category_name"], "Starters");
        assert_eq!(json["variations"][0]["label"], "regular");
    }
}
