//! carta-api - HTTP API server for the carta menu platform

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carta_core::{
    Category, CreateItemRequest, CreateVariationRequest, EmbeddingBackend, ItemFull, MenuQuery,
    PriceVariation, SearchMode, StructuralFilter, UpdateItemRequest, UpdateVariationRequest,
    DEFAULT_SEMANTIC_LIMIT, DEFAULT_SIMILARITY_THRESHOLD,
};
use carta_db::{backfill_embeddings, backfill_search_fields, BackfillReport, Database, PgSearchStore};
use carta_inference::OllamaBackend;
use carta_search::MenuSearchEngine;

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    /// Hybrid search engine over the database-backed search store.
    engine: Arc<MenuSearchEngine<PgSearchStore>>,
    /// Process-wide embedding backend, initialized once at startup.
    embedder: Arc<dyn EmbeddingBackend>,
}

// =============================================================================
// STARTUP
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   RUST_LOG    - standard env filter (default: "carta_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "carta_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    info!(log_format = %log_format, "Logging initialized");

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/carta".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Embedding backend: one instance for the life of the process.
    let embedder: Arc<dyn EmbeddingBackend> = Arc::new(OllamaBackend::from_env()?);
    info!(
        model = embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedding backend initialized"
    );

    let engine = Arc::new(MenuSearchEngine::new(
        Arc::new(db.search.clone()),
        embedder.clone(),
    ));

    let state = AppState {
        db,
        engine,
        embedder,
    };

    let app = Router::new()
        .route("/health", get(health))
        // Search
        .route("/items", get(search_items))
        .route("/search/semantic", get(semantic_search))
        // Item CRUD
        .route("/items", post(create_item))
        .route("/items/:id", get(get_item))
        .route("/items/:id", patch(update_item))
        .route("/items/:id", delete(delete_item))
        // Categories
        .route("/categories", get(list_categories))
        .route("/categories", post(create_category))
        .route("/categories/:id", get(get_category))
        .route("/categories/:id", patch(rename_category))
        .route("/categories/:id", delete(delete_category))
        // Price variations
        .route("/items/:id/variations", get(list_variations))
        .route("/items/:id/variations", post(create_variation))
        .route("/variations/:id", patch(update_variation))
        .route("/variations/:id", delete(delete_variation))
        // Maintenance sweeps
        .route("/admin/backfill/search-fields", post(run_backfill_search_fields))
        .route("/admin/backfill/embeddings", post(run_backfill_embeddings))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// =============================================================================
// SEARCH
// =============================================================================

/// Query parameters for `GET /items`.
#[derive(Debug, Deserialize)]
struct SearchParams {
    search: Option<String>,
    /// Case-insensitive exact match on subcategory.
    #[serde(rename = "type")]
    dish_type: Option<String>,
    price_min: Option<f64>,
    price_max: Option<f64>,
    similarity_threshold: Option<f32>,
    search_mode: Option<SearchMode>,
    limit: Option<i64>,
}

async fn search_items(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ItemFull>>, ApiError> {
    let query = MenuQuery {
        search: params.search,
        filter: StructuralFilter {
            dish_type: params.dish_type,
            price_min: params.price_min,
            price_max: params.price_max,
        },
        similarity_threshold: params
            .similarity_threshold
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
        mode: params.search_mode.unwrap_or_default(),
        limit: params.limit.unwrap_or(DEFAULT_SEMANTIC_LIMIT),
    };

    let items = state.engine.search(&query).await?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
struct SemanticParams {
    q: Option<String>,
    limit: Option<i64>,
}

/// Pure vector search, bypassing the lexical and fuzzy strategies.
async fn semantic_search(
    State(state): State<AppState>,
    Query(params): Query<SemanticParams>,
) -> Result<Json<Vec<ItemFull>>, ApiError> {
    let text = params
        .q
        .ok_or_else(|| ApiError::BadRequest("missing required query parameter: q".to_string()))?;
    let limit = params.limit.unwrap_or(DEFAULT_SEMANTIC_LIMIT);

    let items = state.engine.semantic_search(&text, limit).await?;
    Ok(Json(items))
}

// =============================================================================
// ITEMS
// =============================================================================

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ItemFull>, ApiError> {
    let mut items = state.db.items.hydrate(&[id]).await?;
    items
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", id)))
}

async fn create_item(
    State(state): State<AppState>,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemFull>), ApiError> {
    let item = state.db.items.create(req).await?;
    refresh_embedding(&state, item.id).await;

    let mut items = state.db.items.hydrate(&[item.id]).await?;
    let full = items
        .pop()
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", item.id)))?;
    Ok((StatusCode::CREATED, Json(full)))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ItemFull>, ApiError> {
    let source_changed = req.touches_source_fields();
    let item = state.db.items.update(id, req).await?;
    if source_changed {
        refresh_embedding(&state, item.id).await;
    }

    let mut items = state.db.items.hydrate(&[id]).await?;
    items
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", id)))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.items.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Compute and store the item's embedding. Failure is logged and left for
/// the embedding backfill sweep; the write itself already committed.
async fn refresh_embedding(state: &AppState, item_id: i64) {
    let result = async {
        let document = state.db.items.embedding_document_for(item_id).await?;
        let vectors = state.embedder.embed_texts(&[document]).await?;
        match vectors.into_iter().next() {
            Some(vector) => state.db.items.set_embedding(item_id, &vector).await,
            None => Ok(()),
        }
    }
    .await;

    if let Err(e) = result {
        warn!(
            item_id = item_id,
            error = %e,
            "Embedding refresh failed, deferring to backfill"
        );
    }
}

// =============================================================================
// CATEGORIES
// =============================================================================

#[derive(Debug, Deserialize)]
struct CategoryRequest {
    name: String,
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.db.categories.list().await?))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.db.categories.get(id).await?))
}

async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.db.categories.create(&req.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Rename a category. Member items get fresh derived fields in the same
/// transaction and stale embeddings are regenerated best-effort here.
async fn rename_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    let category = state.db.categories.rename(id, &req.name).await?;

    for item_id in state.db.categories.member_item_ids(id).await? {
        refresh_embedding(&state, item_id).await;
    }

    Ok(Json(category))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.categories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// PRICE VARIATIONS
// =============================================================================

async fn list_variations(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> Result<Json<Vec<PriceVariation>>, ApiError> {
    Ok(Json(state.db.variations.list_for_item(item_id).await?))
}

async fn create_variation(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
    Json(req): Json<CreateVariationRequest>,
) -> Result<(StatusCode, Json<PriceVariation>), ApiError> {
    let variation = state.db.variations.create(item_id, req).await?;
    Ok((StatusCode::CREATED, Json(variation)))
}

async fn update_variation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateVariationRequest>,
) -> Result<Json<PriceVariation>, ApiError> {
    Ok(Json(state.db.variations.update(id, req).await?))
}

async fn delete_variation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.variations.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// MAINTENANCE
// =============================================================================

#[derive(Debug, Serialize)]
struct BackfillResponse {
    processed: u64,
    failed: u64,
}

impl From<BackfillReport> for BackfillResponse {
    fn from(report: BackfillReport) -> Self {
        Self {
            processed: report.processed,
            failed: report.failed,
        }
    }
}

async fn run_backfill_search_fields(
    State(state): State<AppState>,
) -> Result<Json<BackfillResponse>, ApiError> {
    let report = backfill_search_fields(state.db.pool()).await?;
    Ok(Json(report.into()))
}

async fn run_backfill_embeddings(
    State(state): State<AppState>,
) -> Result<Json<BackfillResponse>, ApiError> {
    let report = backfill_embeddings(state.db.pool(), state.embedder.clone()).await?;
    Ok(Json(report.into()))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Database(carta_core::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Upstream(String),
}

impl From<carta_core::Error> for ApiError {
    fn from(err: carta_core::Error) -> Self {
        match &err {
            carta_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            carta_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            carta_core::Error::Embedding(msg) => ApiError::Upstream(msg.clone()),
            carta_core::Error::Request(msg) => ApiError::Upstream(msg.clone()),
            carta_core::Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    let friendly_msg = if msg.contains("price_variations_item_id_label") {
                        "A variation with this label already exists for the item".to_string()
                    } else if msg.contains("categories_name") {
                        "A category with this name already exists".to_string()
                    } else {
                        msg
                    };
                    return ApiError::Conflict(friendly_msg);
                }
                if msg.contains("foreign key") {
                    return ApiError::BadRequest(msg);
                }
                ApiError::Database(err)
            }
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
