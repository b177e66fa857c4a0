//! # carta-db
//!
//! PostgreSQL catalog and search layer for carta.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for categories, items, and price variations
//! - Derived search fields (normalized text + tsvector) maintained
//!   transactionally alongside every source-field write
//! - Full-text, trigram, and pgvector search primitives behind the
//!   `SearchStore` trait
//! - Backfill sweeps for derived fields and embeddings
//!
//! ## Example
//!
//! ```rust,ignore
//! use carta_db::Database;
//! use carta_core::CreateItemRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/carta").await?;
//!     db.migrate().await?;
//!
//!     let momos = db.categories.create("Momos").await?;
//!     let item = db.items.create(CreateItemRequest {
//!         category_id: momos.id,
//!         subcategory: Some("veg".to_string()),
//!         name: "Steamed Momo".to_string(),
//!         description: Some("Nepali dumplings".to_string()),
//!         is_available: true,
//!     }).await?;
//!
//!     println!("Created item: {}", item.id);
//!     Ok(())
//! }
//! ```

pub mod backfill;
pub mod categories;
pub mod items;
pub mod pool;
pub mod search;
pub mod variations;

// Always compiled so integration tests (in tests/) can use the fixtures.
pub mod test_fixtures;

// Re-export core types
pub use carta_core::*;

pub use backfill::{backfill_embeddings, backfill_search_fields, BackfillReport};
pub use categories::PgCategoryRepository;
pub use items::PgItemRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use search::PgSearchStore;
pub use variations::PgVariationRepository;

/// Main database handle aggregating the repositories.
///
/// All repositories share one connection pool; the handle is cheap to
/// clone and safe to share across request handlers.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Category repository.
    pub categories: PgCategoryRepository,
    /// Item repository (owns derived-field maintenance).
    pub items: PgItemRepository,
    /// Price variation repository.
    pub variations: PgVariationRepository,
    /// Store-side search primitives.
    pub search: PgSearchStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            categories: PgCategoryRepository::new(pool.clone()),
            items: PgItemRepository::new(pool.clone()),
            variations: PgVariationRepository::new(pool.clone()),
            search: PgSearchStore::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
