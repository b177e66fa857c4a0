//! Item repository implementation.
//!
//! All writes that touch an item's source fields recompute the derived
//! search columns (`name_norm`, `description_norm`, `category_name_norm`,
//! `tsv`) inside the same transaction, so no query can observe an item
//! whose derived fields disagree with its source fields as a steady state.
//! The dense embedding is nulled on source change and refreshed by the
//! caller or the backfill sweep.

use std::collections::HashMap;

use pgvector::Vector;
use sqlx::{Pool, Postgres, Row, Transaction};

use carta_core::{
    embedding_document, CreateItemRequest, DerivedFields, Error, Item, ItemFull, Result,
    UpdateItemRequest, VariationOut,
};

/// PostgreSQL implementation of the item repository.
#[derive(Clone)]
pub struct PgItemRepository {
    pool: Pool<Postgres>,
}

impl PgItemRepository {
    /// Create a new PgItemRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Fetch a single item by id.
    pub async fn get(&self, id: i64) -> Result<Item> {
        sqlx::query_as::<_, Item>(
            "SELECT id, category_id, subcategory, name, description, is_available,
                    name_norm, description_norm, category_name_norm
             FROM items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("Item {} not found", id)))
    }

    /// Create an item and populate its derived search fields atomically.
    /// The embedding starts out NULL; callers refresh it afterwards.
    pub async fn create(&self, req: CreateItemRequest) -> Result<Item> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let category_name = category_name_tx(&mut tx, req.category_id).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO items (category_id, subcategory, name, description, is_available)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(req.category_id)
        .bind(&req.subcategory)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.is_available)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        reindex_item_tx(&mut tx, id, &req.name, req.description.as_deref(), &category_name)
            .await?;

        tx.commit().await.map_err(Error::Database)?;

        tracing::debug!(subsystem = "catalog", op = "create_item", item_id = id, "Item created");
        self.get(id).await
    }

    /// Apply a partial update. Source-field changes re-derive the search
    /// columns and invalidate the embedding in the same transaction.
    pub async fn update(&self, id: i64, req: UpdateItemRequest) -> Result<Item> {
        if req.is_empty() {
            return self.get(id).await;
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let existing = sqlx::query(
            "SELECT category_id, name, description, subcategory FROM items
             WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("Item {} not found", id)))?;

        let category_id = req
            .category_id
            .unwrap_or_else(|| existing.get::<i64, _>("category_id"));
        let name = req
            .name
            .clone()
            .unwrap_or_else(|| existing.get::<String, _>("name"));
        let description = req
            .description
            .clone()
            .or_else(|| existing.get::<Option<String>, _>("description"));
        let subcategory = req
            .subcategory
            .clone()
            .or_else(|| existing.get::<Option<String>, _>("subcategory"));

        let category_name = category_name_tx(&mut tx, category_id).await?;

        sqlx::query(
            "UPDATE items
             SET category_id = $2,
                 name = $3,
                 description = $4,
                 subcategory = $5,
                 is_available = COALESCE($6, is_available)
             WHERE id = $1",
        )
        .bind(id)
        .bind(category_id)
        .bind(&name)
        .bind(&description)
        .bind(&subcategory)
        .bind(req.is_available)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if req.touches_source_fields() {
            reindex_item_tx(&mut tx, id, &name, description.as_deref(), &category_name).await?;
            clear_embedding_tx(&mut tx, id).await?;
        }

        tx.commit().await.map_err(Error::Database)?;
        self.get(id).await
    }

    /// Delete an item. Owned price variations cascade at the schema level.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Item {} not found", id)));
        }
        Ok(())
    }

    /// Store a computed dense embedding for an item.
    pub async fn set_embedding(&self, id: i64, embedding: &Vector) -> Result<()> {
        let result = sqlx::query("UPDATE items SET emb = $2 WHERE id = $1")
            .bind(id)
            .bind(embedding)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Item {} not found", id)));
        }
        Ok(())
    }

    /// Compose the embedding document for an item from its current source
    /// fields and owning category name.
    pub async fn embedding_document_for(&self, id: i64) -> Result<String> {
        let row = sqlx::query(
            "SELECT i.name, i.description, i.subcategory, c.name AS category_name
             FROM items i
             JOIN categories c ON c.id = i.category_id
             WHERE i.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("Item {} not found", id)))?;

        Ok(embedding_document(
            row.get::<String, _>("name").as_str(),
            row.get::<Option<String>, _>("description").as_deref(),
            row.get::<String, _>("category_name").as_str(),
            row.get::<Option<String>, _>("subcategory").as_deref(),
        ))
    }

    /// Fetch fully hydrated items for the given ids, preserving id order.
    pub async fn hydrate(&self, ids: &[i64]) -> Result<Vec<ItemFull>> {
        hydrate_items(&self.pool, ids).await
    }
}

/// Look up a category's name inside a transaction, failing with NotFound
/// for a dangling reference.
pub(crate) async fn category_name_tx(
    tx: &mut Transaction<'_, Postgres>,
    category_id: i64,
) -> Result<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM categories WHERE id = $1")
        .bind(category_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("Category {} not found", category_id)))
}

/// Recompute the normalized columns and lexical vector for one item.
/// Must run in the same transaction as the source-field write.
pub(crate) async fn reindex_item_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    name: &str,
    description: Option<&str>,
    category_name: &str,
) -> Result<()> {
    let derived = DerivedFields::compute(name, description, category_name);
    let lexical = derived.lexical_document();

    sqlx::query(
        "UPDATE items
         SET name_norm = $2,
             description_norm = $3,
             category_name_norm = $4,
             tsv = to_tsvector('simple', $5)
         WHERE id = $1",
    )
    .bind(id)
    .bind(&derived.name_norm)
    .bind(&derived.description_norm)
    .bind(&derived.category_name_norm)
    .bind(&lexical)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

/// Null a stale embedding so the backfill sweep (or the caller) regenerates it.
pub(crate) async fn clear_embedding_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
) -> Result<()> {
    sqlx::query("UPDATE items SET emb = NULL WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
    Ok(())
}

/// Fetch full item records (category name resolved, variations attached)
/// for an id list, emitted in the order the ids were given. Unknown ids
/// are skipped.
pub(crate) async fn hydrate_items(pool: &Pool<Postgres>, ids: &[i64]) -> Result<Vec<ItemFull>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        "SELECT i.id, i.category_id, c.name AS category_name, i.subcategory,
                i.name, i.description, i.is_available
         FROM items i
         JOIN categories c ON c.id = i.category_id
         WHERE i.id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)?;

    let variation_rows = sqlx::query(
        "SELECT id, item_id, label, final_price::float8 AS final_price, is_available
         FROM price_variations
         WHERE item_id = ANY($1)
         ORDER BY item_id ASC, id ASC",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)?;

    let mut variations: HashMap<i64, Vec<VariationOut>> = HashMap::new();
    for row in variation_rows {
        variations
            .entry(row.get("item_id"))
            .or_default()
            .push(VariationOut {
                id: row.get("id"),
                label: row.get("label"),
                final_price: row.get("final_price"),
                is_available: row.get("is_available"),
            });
    }

    let mut by_id: HashMap<i64, ItemFull> = rows
        .into_iter()
        .map(|row| {
            let id: i64 = row.get("id");
            let item = ItemFull {
                id,
                category_id: row.get("category_id"),
                category_name: row.get("category_name"),
                subcategory: row.get("subcategory"),
                name: row.get("name"),
                description: row.get("description"),
                is_available: row.get("is_available"),
                variations: variations.remove(&id).unwrap_or_default(),
            };
            (id, item)
        })
        .collect();

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}
