//! Store-side search primitives over PostgreSQL.
//!
//! Implements the ranked-id queries the hybrid engine composes: lexical
//! full-text over the precomputed `tsv` column, trigram similarity over the
//! normalized name and category columns (whole-query and per-word variants),
//! and cosine nearest-neighbour over the dense `emb` column. All variants
//! apply the structural filter in SQL and break score ties by id ascending.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Pool, Postgres, Row};

use carta_core::{Error, ItemFull, Result, ScoredId, SearchStore, StructuralFilter};

use crate::items::hydrate_items;

/// PostgreSQL implementation of the search store.
#[derive(Clone)]
pub struct PgSearchStore {
    pool: Pool<Postgres>,
}

impl PgSearchStore {
    /// Create a new PgSearchStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn scored_row(row: &PgRow) -> ScoredId {
    ScoredId {
        id: row.get("id"),
        score: row.get("score"),
    }
}

/// Append the structural filter as SQL clauses against items alias `i`,
/// advancing the bind counter past the placeholders emitted. The price
/// bounds live in a single EXISTS so one variation must satisfy the whole
/// band. Bind order matches `bind_filter`.
fn push_filter_sql(sql: &mut String, filter: &StructuralFilter, bind_idx: &mut usize) {
    if filter.dish_type.is_some() {
        sql.push_str(&format!(" AND LOWER(i.subcategory) = LOWER(${})", bind_idx));
        *bind_idx += 1;
    }
    if filter.price_min.is_some() || filter.price_max.is_some() {
        sql.push_str(" AND EXISTS (SELECT 1 FROM price_variations pv WHERE pv.item_id = i.id");
        if filter.price_min.is_some() {
            sql.push_str(&format!(" AND pv.final_price::float8 >= ${}", bind_idx));
            *bind_idx += 1;
        }
        if filter.price_max.is_some() {
            sql.push_str(&format!(" AND pv.final_price::float8 <= ${}", bind_idx));
            *bind_idx += 1;
        }
        sql.push(')');
    }
}

/// Bind the structural filter's values in the order `push_filter_sql`
/// emitted their placeholders.
fn bind_filter<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    filter: &StructuralFilter,
) -> Query<'q, Postgres, PgArguments> {
    if let Some(dish_type) = &filter.dish_type {
        query = query.bind(dish_type.clone());
    }
    if let Some(min) = filter.price_min {
        query = query.bind(min);
    }
    if let Some(max) = filter.price_max {
        query = query.bind(max);
    }
    query
}

#[async_trait]
impl SearchStore for PgSearchStore {
    async fn filter_default_order(&self, filter: &StructuralFilter) -> Result<Vec<i64>> {
        let mut sql = String::from("SELECT i.id FROM items i WHERE TRUE");
        let mut bind_idx = 1;
        push_filter_sql(&mut sql, filter, &mut bind_idx);
        sql.push_str(" ORDER BY i.name ASC, i.id ASC");

        let rows = bind_filter(sqlx::query(&sql), filter)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn lexical_match(
        &self,
        query: &str,
        filter: &StructuralFilter,
    ) -> Result<Vec<ScoredId>> {
        // websearch_to_tsquery gives implicit AND of terms with opt-in OR,
        // and never raises on user input. The 'simple' configuration skips
        // language stemming; normalization already happened at index time.
        let mut sql = String::from(
            "SELECT i.id,
                    ts_rank(i.tsv, websearch_to_tsquery('simple', $1))::float4 AS score
             FROM items i
             WHERE i.tsv @@ websearch_to_tsquery('simple', $1)",
        );
        let mut bind_idx = 2;
        push_filter_sql(&mut sql, filter, &mut bind_idx);
        sql.push_str(" ORDER BY score DESC, i.id ASC");

        let rows = bind_filter(sqlx::query(&sql).bind(query), filter)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(scored_row).collect())
    }

    async fn fuzzy_match(
        &self,
        query_norm: &str,
        threshold: f32,
        filter: &StructuralFilter,
    ) -> Result<Vec<ScoredId>> {
        // COALESCE guards NULL similarity against items with no description
        // -derived columns; only strictly-above-threshold rows match.
        let mut sql = String::from(
            "SELECT i.id,
                    GREATEST(COALESCE(similarity(i.name_norm, $1), 0),
                             COALESCE(similarity(i.category_name_norm, $1), 0))::float4 AS score
             FROM items i
             WHERE GREATEST(COALESCE(similarity(i.name_norm, $1), 0),
                            COALESCE(similarity(i.category_name_norm, $1), 0)) > $2",
        );
        let mut bind_idx = 3;
        push_filter_sql(&mut sql, filter, &mut bind_idx);
        sql.push_str(" ORDER BY score DESC, i.id ASC");

        let rows = bind_filter(sqlx::query(&sql).bind(query_norm).bind(threshold), filter)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(scored_row).collect())
    }

    async fn combined_match(
        &self,
        words: &[String],
        threshold: f32,
        filter: &StructuralFilter,
    ) -> Result<Vec<ScoredId>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }

        // One bind per word; a field matches only when EVERY word clears
        // the threshold against it, and its score is the per-word average.
        // The item's score is the better of the two fields.
        let threshold_idx = words.len() + 1;
        let per_field = |column: &str| -> (String, String) {
            let sims: Vec<String> = (1..=words.len())
                .map(|idx| format!("COALESCE(similarity(i.{}, ${}), 0)", column, idx))
                .collect();
            let all = sims
                .iter()
                .map(|sim| format!("{} > ${}", sim, threshold_idx))
                .collect::<Vec<_>>()
                .join(" AND ");
            let avg = format!("({}) / {}", sims.join(" + "), words.len());
            (all, avg)
        };
        let (name_all, name_avg) = per_field("name_norm");
        let (cat_all, cat_avg) = per_field("category_name_norm");

        let mut sql = format!(
            "SELECT i.id,
                    GREATEST(CASE WHEN {name_all} THEN {name_avg} ELSE 0 END,
                             CASE WHEN {cat_all} THEN {cat_avg} ELSE 0 END)::float4 AS score
             FROM items i
             WHERE (({name_all}) OR ({cat_all}))",
        );
        let mut bind_idx = threshold_idx + 1;
        push_filter_sql(&mut sql, filter, &mut bind_idx);
        sql.push_str(" ORDER BY score DESC, i.id ASC");

        let mut query = sqlx::query(&sql);
        for word in words {
            query = query.bind(word.as_str());
        }
        let rows = bind_filter(query.bind(threshold), filter)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(scored_row).collect())
    }

    async fn semantic_match(
        &self,
        embedding: &Vector,
        limit: i64,
        filter: &StructuralFilter,
    ) -> Result<Vec<ScoredId>> {
        // `<=>` is cosine distance; reporting 1 - distance keeps every
        // strategy's score on a higher-is-better scale. Items awaiting a
        // backfilled embedding are simply absent from this space.
        let mut sql = String::from(
            "SELECT i.id, (1 - (i.emb <=> $1))::float4 AS score
             FROM items i
             WHERE i.emb IS NOT NULL",
        );
        let mut bind_idx = 3;
        push_filter_sql(&mut sql, filter, &mut bind_idx);
        sql.push_str(" ORDER BY i.emb <=> $1 ASC, i.id ASC LIMIT $2");

        let rows = bind_filter(sqlx::query(&sql).bind(embedding.clone()).bind(limit), filter)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(scored_row).collect())
    }

    async fn hydrate(&self, ids: &[i64]) -> Result<Vec<ItemFull>> {
        hydrate_items(&self.pool, ids).await
    }
}
