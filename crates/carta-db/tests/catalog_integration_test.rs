//! Integration tests for catalog writes and derived-field maintenance.
//!
//! All tests are ignored by default; see `search_integration_test.rs` for
//! how to run them against a migrated database.

use std::sync::Arc;

use sqlx::Row;

use carta_core::{DerivedFields, UpdateItemRequest};
use carta_db::test_fixtures::{connect_test_db, seed_item, unique_suffix};
use carta_db::{backfill_embeddings, backfill_search_fields};
use carta_inference::MockEmbeddingBackend;

/// Read the stored derived columns for an item.
async fn stored_derived(db: &carta_db::Database, id: i64) -> (Option<String>, Option<String>, Option<String>) {
    let row = sqlx::query(
        "SELECT name_norm, description_norm, category_name_norm FROM items WHERE id = $1",
    )
    .bind(id)
    .fetch_one(db.pool())
    .await
    .expect("fetch derived");
    (
        row.get("name_norm"),
        row.get("description_norm"),
        row.get("category_name_norm"),
    )
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_create_populates_derived_fields() {
    let db = connect_test_db().await.expect("connect");
    let suffix = unique_suffix();

    let starters = db
        .categories
        .create(&format!("Starters-{}", suffix))
        .await
        .expect("category");
    let id = seed_item(
        &db,
        starters.id,
        "  Veg Momo ",
        Some("Nepali Dumplings"),
        None,
        250.0,
    )
    .await
    .expect("seed");

    let (name_norm, description_norm, category_name_norm) = stored_derived(&db, id).await;
    let expected = DerivedFields::compute(
        "  Veg Momo ",
        Some("Nepali Dumplings"),
        &format!("Starters-{}", suffix),
    );
    assert_eq!(name_norm, expected.name_norm);
    assert_eq!(name_norm.as_deref(), Some("veg momo"));
    assert_eq!(description_norm.as_deref(), Some("nepali dumplings"));
    assert_eq!(category_name_norm, expected.category_name_norm);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_update_rederives_and_clears_embedding() {
    let db = connect_test_db().await.expect("connect");
    let suffix = unique_suffix();
    let backend = Arc::new(MockEmbeddingBackend::new());

    let starters = db
        .categories
        .create(&format!("Starters-{}", suffix))
        .await
        .expect("category");
    let id = seed_item(&db, starters.id, "Veg Momo", None, None, 250.0)
        .await
        .expect("seed");

    // Embed, then change a source field: the embedding must be invalidated.
    let doc = db.items.embedding_document_for(id).await.expect("doc");
    let vectors = carta_core::EmbeddingBackend::embed_texts(backend.as_ref(), &[doc])
        .await
        .expect("embed");
    db.items.set_embedding(id, &vectors[0]).await.expect("set emb");

    db.items
        .update(
            id,
            UpdateItemRequest {
                name: Some("Steamed Momo".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("update");

    let (name_norm, _, _) = stored_derived(&db, id).await;
    assert_eq!(name_norm.as_deref(), Some("steamed momo"));

    let has_emb: bool =
        sqlx::query_scalar("SELECT emb IS NOT NULL FROM items WHERE id = $1")
            .bind(id)
            .fetch_one(db.pool())
            .await
            .expect("emb check");
    assert!(!has_emb);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_availability_update_keeps_derived_fields() {
    let db = connect_test_db().await.expect("connect");
    let suffix = unique_suffix();

    let starters = db
        .categories
        .create(&format!("Starters-{}", suffix))
        .await
        .expect("category");
    let id = seed_item(&db, starters.id, "Veg Momo", None, None, 250.0)
        .await
        .expect("seed");
    let before = stored_derived(&db, id).await;

    let item = db
        .items
        .update(
            id,
            UpdateItemRequest {
                is_available: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("update");

    assert!(!item.is_available);
    assert_eq!(stored_derived(&db, id).await, before);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_category_rename_propagates_to_items() {
    let db = connect_test_db().await.expect("connect");
    let suffix = unique_suffix();

    let category = db
        .categories
        .create(&format!("Starters-{}", suffix))
        .await
        .expect("category");
    let id = seed_item(&db, category.id, "Veg Momo", None, None, 250.0)
        .await
        .expect("seed");

    let new_name = format!("Appetizers-{}", suffix);
    db.categories
        .rename(category.id, &new_name)
        .await
        .expect("rename");

    let (_, _, category_name_norm) = stored_derived(&db, id).await;
    assert_eq!(category_name_norm, Some(new_name.to_lowercase()));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_duplicate_variation_label_rejected() {
    let db = connect_test_db().await.expect("connect");
    let suffix = unique_suffix();

    let starters = db
        .categories
        .create(&format!("Starters-{}", suffix))
        .await
        .expect("category");
    let id = seed_item(&db, starters.id, "Veg Momo", None, None, 250.0)
        .await
        .expect("seed");

    // seed_item already created the "regular" variation.
    let duplicate = db
        .variations
        .create(
            id,
            carta_core::CreateVariationRequest {
                label: "regular".to_string(),
                final_price: 300.0,
                is_available: true,
            },
        )
        .await;
    assert!(duplicate.is_err());
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_backfill_sweeps_repair_missing_state() {
    let db = connect_test_db().await.expect("connect");
    let suffix = unique_suffix();
    let backend = Arc::new(MockEmbeddingBackend::new());

    let starters = db
        .categories
        .create(&format!("Starters-{}", suffix))
        .await
        .expect("category");
    let id = seed_item(&db, starters.id, "Veg Momo", None, None, 250.0)
        .await
        .expect("seed");

    // Blow away the derived state, then let the sweeps rebuild it.
    sqlx::query("UPDATE items SET name_norm = NULL, tsv = NULL, emb = NULL WHERE id = $1")
        .bind(id)
        .execute(db.pool())
        .await
        .expect("reset");

    let report = backfill_search_fields(db.pool()).await.expect("sweep");
    assert_eq!(report.failed, 0);
    assert!(report.processed >= 1);

    let report = backfill_embeddings(db.pool(), backend).await.expect("sweep");
    assert_eq!(report.failed, 0);
    assert!(report.processed >= 1);

    let (name_norm, _, _) = stored_derived(&db, id).await;
    assert_eq!(name_norm.as_deref(), Some("veg momo"));
    let has_emb: bool =
        sqlx::query_scalar("SELECT emb IS NOT NULL FROM items WHERE id = $1")
            .bind(id)
            .fetch_one(db.pool())
            .await
            .expect("emb check");
    assert!(has_emb);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_get_category_round_trips() {
    let db = connect_test_db().await.expect("connect");
    let suffix = unique_suffix();

    let name = format!("Desserts-{}", suffix);
    let created = db.categories.create(&name).await.expect("category");

    let fetched = db.categories.get(created.id).await.expect("get");
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.name, name);

    let missing = db.categories.get(i64::MAX).await;
    assert!(matches!(missing, Err(carta_core::Error::NotFound(_))));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_member_item_ids_lists_only_members_ascending() {
    let db = connect_test_db().await.expect("connect");
    let suffix = unique_suffix();

    let starters = db
        .categories
        .create(&format!("Starters-{}", suffix))
        .await
        .expect("category");
    let mains = db
        .categories
        .create(&format!("Mains-{}", suffix))
        .await
        .expect("category");

    let first = seed_item(&db, starters.id, "Veg Momo", None, None, 250.0)
        .await
        .expect("seed");
    let second = seed_item(&db, starters.id, "Chicken Momo", None, None, 300.0)
        .await
        .expect("seed");
    seed_item(&db, mains.id, "Veg Burger", None, None, 450.0)
        .await
        .expect("seed");

    let ids = db.categories.member_item_ids(starters.id).await.expect("members");
    assert_eq!(ids, vec![first, second]);
}
