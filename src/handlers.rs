use crate::bsale_client::{extract_items, BsaleClient, LIST_KEYS};
use crate::config::{Config, MAX_PAGE_LIMIT};
use crate::enrichment::ProductEnricher;
use crate::errors::{AppError, ResultExt};
use crate::models::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Request bodies are small JSON documents; 1 MiB is plenty.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Client for the BSale API.
    pub bsale: BsaleClient,
    /// Variant enrichment pipeline.
    pub enricher: ProductEnricher,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let bsale = BsaleClient::from_config(&config)?;
        let enricher = ProductEnricher::from_config(bsale.clone(), &config);
        Ok(Self {
            config,
            bsale,
            enricher,
        })
    }

    /// Per-request token if given, otherwise the configured one.
    fn token(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.config.bsale_access_token.as_str())
            .to_string()
    }
}

/// Builds the HTTP router with CORS, tracing and body-size limits.
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/:id", get(get_product))
        .route("/api/clients", get(list_clients).post(create_client))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)));

    Router::new()
        .route("/health", get(health))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "bsale-catalog-proxy",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/products
///
/// Fetches a page of products and enriches every item with variant, price
/// and stock aggregates. `?id=` switches to the single-product lookup and
/// `?enrich=false` returns the upstream page untouched.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `params` - Query parameters (token, limit, offset, enrich, id).
///
/// # Returns
///
/// * `Result<Json<Value>, AppError>` - The (enriched) product page or an error.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProductQueryParams>,
) -> Result<Json<Value>, AppError> {
    if let Some(id) = params.id.as_deref().filter(|id| !id.trim().is_empty()) {
        return product_by_id(&state, id.trim(), &params).await.map(Json);
    }

    let token = state.token(params.token.as_deref());
    let limit = params
        .limit
        .unwrap_or(state.config.product_page_limit)
        .clamp(1, MAX_PAGE_LIMIT);
    tracing::info!("GET /api/products - limit: {}, offset: {:?}", limit, params.offset);

    let page = state
        .bsale
        .list_products(&token, limit, params.offset)
        .await
        .context("fetching product page")?;

    if !params.should_enrich() {
        return Ok(Json(page));
    }

    let raw_items = extract_items(&page).cloned().unwrap_or_default();
    let summaries: Vec<ProductSummary> = raw_items
        .iter()
        .cloned()
        .filter_map(ProductSummary::from_value)
        .collect();

    let enriched = state.enricher.enrich_page(summaries, &token).await;
    let items = merge_enriched(raw_items, enriched);

    Ok(Json(replace_items(page, items)))
}

/// Puts enriched products back at the positions of the object items they came
/// from. Entries that are not objects are kept as received.
pub fn merge_enriched(raw_items: Vec<Value>, enriched: Vec<EnrichedProduct>) -> Vec<Value> {
    let mut enriched = enriched.into_iter();
    raw_items
        .into_iter()
        .map(|raw| {
            if raw.is_object() {
                enriched.next().map(|p| p.to_json()).unwrap_or(raw)
            } else {
                raw
            }
        })
        .collect()
}

/// GET /api/products/:id
///
/// Retrieves one product and enriches it unless `?enrich=false`.
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ProductQueryParams>,
) -> Result<Json<Value>, AppError> {
    product_by_id(&state, &id, &params).await.map(Json)
}

async fn product_by_id(
    state: &AppState,
    id: &str,
    params: &ProductQueryParams,
) -> Result<Value, AppError> {
    tracing::info!("GET product {}", id);
    let token = state.token(params.token.as_deref());

    let product = state
        .bsale
        .get_product(&token, id)
        .await
        .with_context(|| format!("fetching product {}", id))?;

    if !params.should_enrich() {
        return Ok(product);
    }

    let summary = ProductSummary::from_value(product).ok_or_else(|| {
        AppError::ExternalApiError(format!("Product {} payload is not an object", id))
    })?;

    Ok(state.enricher.enrich_one(summary, &token).await.to_json())
}

/// POST /api/products
///
/// Creates a product in BSale with the request body as-is.
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TokenParams>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("POST /api/products");
    let token = state.token(params.token.as_deref());
    let created = state.bsale.create_product(&token, &body).await?;
    Ok(Json(created))
}

/// GET /api/clients
///
/// Lists clients, or looks one up by `?code=`.
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClientQueryParams>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /api/clients - code: {:?}", params.code);
    let token = state.token(params.token.as_deref());
    let code = params.code.as_deref().filter(|c| !c.trim().is_empty());
    let clients = state.bsale.list_clients(&token, code).await?;
    Ok(Json(clients))
}

/// POST /api/clients
///
/// Creates a client in BSale with the request body as-is.
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TokenParams>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("POST /api/clients");
    let token = state.token(params.token.as_deref());
    let created = state.bsale.create_client(&token, &body).await?;
    Ok(Json(created))
}

/// Swaps the record list of a page payload for `items`, keeping the other
/// wrapper keys (`count`, `limit`, `offset`, `next`, ...).
pub fn replace_items(page: Value, items: Vec<Value>) -> Value {
    match page {
        Value::Object(mut map) => {
            let key = LIST_KEYS
                .iter()
                .find(|key| map.get(**key).is_some_and(Value::is_array))
                .copied()
                .unwrap_or("items");
            map.insert(key.to_string(), Value::Array(items));
            Value::Object(map)
        }
        _ => json!({
            "count": items.len(),
            "items": items,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_items_keeps_wrapper_keys() {
        let page = json!({"count": 120, "limit": 2, "items": [{"id": 1}, {"id": 2}]});
        let replaced = replace_items(page, vec![json!({"id": 1, "x": 1})]);
        assert_eq!(replaced["count"], 120);
        assert_eq!(replaced["items"], json!([{"id": 1, "x": 1}]));
    }

    #[test]
    fn test_replace_items_uses_existing_list_key() {
        let page = json!({"products": [{"id": 1}]});
        let replaced = replace_items(page, vec![]);
        assert_eq!(replaced["products"], json!([]));
        assert!(replaced.get("items").is_none());
    }

    #[test]
    fn test_merge_enriched_passes_non_objects_through() {
        let enriched = [json!({"id": 1}), json!({"id": 2})]
            .into_iter()
            .filter_map(ProductSummary::from_value)
            .map(|s| EnrichedProduct::new(s, ProductStats::empty()))
            .collect();
        let merged = merge_enriched(
            vec![json!({"id": 1}), json!(null), json!({"id": 2}), json!(7)],
            enriched,
        );

        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0]["id"], 1);
        assert_eq!(merged[0]["priceRange"], "no price");
        assert_eq!(merged[1], Value::Null);
        assert_eq!(merged[2]["id"], 2);
        assert_eq!(merged[3], 7);
    }

    #[test]
    fn test_replace_items_wraps_bare_arrays() {
        let replaced = replace_items(json!([{"id": 1}]), vec![json!({"id": 1})]);
        assert_eq!(replaced["count"], 1);
        assert_eq!(replaced["items"].as_array().map(Vec::len), Some(1));
    }
}
