//! Price variation repository implementation.
//!
//! Variations carry no searchable text, so writes here never touch the
//! derived search fields of the owning item.

use sqlx::{Pool, Postgres};

use carta_core::{
    CreateVariationRequest, Error, PriceVariation, Result, UpdateVariationRequest,
};

/// PostgreSQL implementation of the price variation repository.
#[derive(Clone)]
pub struct PgVariationRepository {
    pool: Pool<Postgres>,
}

impl PgVariationRepository {
    /// Create a new PgVariationRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<PriceVariation> {
        sqlx::query_as::<_, PriceVariation>(
            "SELECT id, item_id, label, final_price::float8 AS final_price, is_available
             FROM price_variations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("Price variation {} not found", id)))
    }

    pub async fn list_for_item(&self, item_id: i64) -> Result<Vec<PriceVariation>> {
        let variations = sqlx::query_as::<_, PriceVariation>(
            "SELECT id, item_id, label, final_price::float8 AS final_price, is_available
             FROM price_variations WHERE item_id = $1 ORDER BY id ASC",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(variations)
    }

    /// Attach a variation to an item. The (item_id, label) pair is unique;
    /// a duplicate label surfaces as a database unique violation.
    pub async fn create(&self, item_id: i64, req: CreateVariationRequest) -> Result<PriceVariation> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE id = $1)")
            .bind(item_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        if !exists {
            return Err(Error::NotFound(format!("Item {} not found", item_id)));
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO price_variations (item_id, label, final_price, is_available)
             VALUES ($1, $2, $3::float8::numeric, $4)
             RETURNING id",
        )
        .bind(item_id)
        .bind(&req.label)
        .bind(req.final_price)
        .bind(req.is_available)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.get(id).await
    }

    pub async fn update(&self, id: i64, req: UpdateVariationRequest) -> Result<PriceVariation> {
        let mut clauses: Vec<String> = Vec::new();
        let mut bind_idx = 2;

        if req.label.is_some() {
            clauses.push(format!("label = ${}", bind_idx));
            bind_idx += 1;
        }
        if req.final_price.is_some() {
            clauses.push(format!("final_price = ${}::float8::numeric", bind_idx));
            bind_idx += 1;
        }
        if req.is_available.is_some() {
            clauses.push(format!("is_available = ${}", bind_idx));
        }

        if clauses.is_empty() {
            return self.get(id).await;
        }

        let sql = format!(
            "UPDATE price_variations SET {} WHERE id = $1",
            clauses.join(", ")
        );
        let mut query = sqlx::query(&sql).bind(id);
        if let Some(label) = &req.label {
            query = query.bind(label);
        }
        if let Some(price) = req.final_price {
            query = query.bind(price);
        }
        if let Some(available) = req.is_available {
            query = query.bind(available);
        }

        let result = query.execute(&self.pool).await.map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Price variation {} not found", id)));
        }

        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM price_variations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Price variation {} not found", id)));
        }
        Ok(())
    }
}
