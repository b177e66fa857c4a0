//! Maintenance sweeps that repair derived search state.
//!
//! Both sweeps commit per item and keep going past individual failures,
//! so one bad row (or one upstream hiccup) never wedges the whole run.
//! Re-running a sweep is always safe.

use std::sync::Arc;

use serde::Serialize;
use sqlx::{Pool, Postgres, Row};

use carta_core::{embedding_document, EmbeddingBackend, Error, Result};

use crate::items::reindex_item_tx;

/// Outcome tally for one sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BackfillReport {
    /// Items successfully brought up to date.
    pub processed: u64,
    /// Items that errored and were skipped.
    pub failed: u64,
}

/// Recompute the normalized columns and lexical vector for every item.
/// Used after bulk imports and after changes to the normalization rules.
pub async fn backfill_search_fields(pool: &Pool<Postgres>) -> Result<BackfillReport> {
    let rows = sqlx::query(
        "SELECT i.id, i.name, i.description, c.name AS category_name
         FROM items i
         JOIN categories c ON c.id = i.category_id
         ORDER BY i.id ASC",
    )
    .fetch_all(pool)
    .await
    .map_err(Error::Database)?;

    let total = rows.len();
    let mut report = BackfillReport::default();

    for row in rows {
        let id: i64 = row.get("id");
        let name: String = row.get("name");
        let description: Option<String> = row.get("description");
        let category_name: String = row.get("category_name");

        let outcome = async {
            let mut tx = pool.begin().await.map_err(Error::Database)?;
            reindex_item_tx(&mut tx, id, &name, description.as_deref(), &category_name).await?;
            tx.commit().await.map_err(Error::Database)
        }
        .await;

        match outcome {
            Ok(()) => report.processed += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    subsystem = "backfill",
                    op = "search_fields",
                    item_id = id,
                    error = %e,
                    "Failed to reindex item, continuing"
                );
            }
        }
    }

    tracing::info!(
        subsystem = "backfill",
        op = "search_fields",
        total = total,
        processed = report.processed,
        failed = report.failed,
        "Search field backfill complete"
    );
    Ok(report)
}

/// Generate and store embeddings for every item missing one. Each item is
/// embedded and committed individually so progress survives a mid-run
/// provider outage.
pub async fn backfill_embeddings(
    pool: &Pool<Postgres>,
    backend: Arc<dyn EmbeddingBackend>,
) -> Result<BackfillReport> {
    let rows = sqlx::query(
        "SELECT i.id, i.name, i.description, i.subcategory, c.name AS category_name
         FROM items i
         JOIN categories c ON c.id = i.category_id
         WHERE i.emb IS NULL
         ORDER BY i.id ASC",
    )
    .fetch_all(pool)
    .await
    .map_err(Error::Database)?;

    let total = rows.len();
    let mut report = BackfillReport::default();

    for row in rows {
        let id: i64 = row.get("id");
        let document = embedding_document(
            row.get::<String, _>("name").as_str(),
            row.get::<Option<String>, _>("description").as_deref(),
            row.get::<String, _>("category_name").as_str(),
            row.get::<Option<String>, _>("subcategory").as_deref(),
        );

        let outcome = async {
            let vectors = backend.embed_texts(&[document]).await?;
            let vector = vectors
                .into_iter()
                .next()
                .ok_or_else(|| Error::Embedding("backend returned no vectors".to_string()))?;

            sqlx::query("UPDATE items SET emb = $2 WHERE id = $1")
                .bind(id)
                .bind(&vector)
                .execute(pool)
                .await
                .map_err(Error::Database)?;
            Ok::<(), Error>(())
        }
        .await;

        match outcome {
            Ok(()) => report.processed += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    subsystem = "backfill",
                    op = "embeddings",
                    item_id = id,
                    error = %e,
                    "Failed to embed item, continuing"
                );
            }
        }
    }

    tracing::info!(
        subsystem = "backfill",
        op = "embeddings",
        model = backend.model_name(),
        total = total,
        processed = report.processed,
        failed = report.failed,
        "Embedding backfill complete"
    );
    Ok(report)
}
