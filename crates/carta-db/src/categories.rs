//! Category repository implementation.

use sqlx::{Pool, Postgres, Row};

use carta_core::{Category, Error, Result};

use crate::items::{clear_embedding_tx, reindex_item_tx};

/// PostgreSQL implementation of the category repository.
#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    /// Create a new PgCategoryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Category> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("Category {} not found", id)))
    }

    /// Ids of the items belonging to a category, id ascending.
    pub async fn member_item_ids(&self, id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM items WHERE category_id = $1 ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(ids)
    }

    pub async fn list(&self) -> Result<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(categories)
    }

    pub async fn create(&self, name: &str) -> Result<Category> {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO categories (name) VALUES ($1) RETURNING id")
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;

        Ok(Category {
            id,
            name: name.to_string(),
        })
    }

    /// Rename a category. Every item in the category carries the category
    /// name in its derived search fields, so the rename recomputes those
    /// fields and invalidates the affected embeddings in one transaction.
    pub async fn rename(&self, id: i64, name: &str) -> Result<Category> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let result = sqlx::query("UPDATE categories SET name = $2 WHERE id = $1")
            .bind(id)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Category {} not found", id)));
        }

        let members = sqlx::query(
            "SELECT id, name, description FROM items WHERE category_id = $1 ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let reindexed = members.len();
        for row in members {
            let item_id: i64 = row.get("id");
            let item_name: String = row.get("name");
            let description: Option<String> = row.get("description");

            reindex_item_tx(&mut tx, item_id, &item_name, description.as_deref(), name).await?;
            clear_embedding_tx(&mut tx, item_id).await?;
        }

        tx.commit().await.map_err(Error::Database)?;

        tracing::info!(
            subsystem = "catalog",
            op = "rename_category",
            category_id = id,
            items_reindexed = reindexed,
            "Category renamed"
        );

        Ok(Category {
            id,
            name: name.to_string(),
        })
    }

    /// Delete a category. Fails while items still reference it.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Category {} not found", id)));
        }
        Ok(())
    }
}
