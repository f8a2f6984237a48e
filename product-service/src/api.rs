use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use health::{RouteSet, RouteTable};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::monitoring::track_metrics;
use crate::store::{Product, ProductStore, StoreError};

pub const PRODUCTS_PATH: &str = "/api/v1/products";
pub const PRODUCT_PATH: &str = "/api/v1/products/:id";

const MAX_PAGE_SIZE: i64 = 10;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("product not found")]
    NotFound,
    /// The id is numeric but does not fit a product id.
    #[error("Invalid product ID")]
    InvalidId,
    #[error("Invalid request payload")]
    InvalidPayload(#[from] JsonRejection),
    #[error("{0}")]
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            err => ApiError::Store(err),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidId | ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(err) = &self {
            error!("products store error: {}", err);
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
struct ApiState {
    store: Arc<dyn ProductStore>,
}

/// Query string of the list endpoint. Unparseable values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    count: Option<String>,
    start: Option<String>,
}

impl Pagination {
    /// Returns `(start, count)` with count in `1..=10` and start >= 0.
    pub fn clamp(&self) -> (i64, i64) {
        let parse = |v: &Option<String>| v.as_deref().and_then(|v| v.parse::<i64>().ok());
        let count = match parse(&self.count) {
            Some(count) if (1..=MAX_PAGE_SIZE).contains(&count) => count,
            _ => MAX_PAGE_SIZE,
        };
        let start = parse(&self.start).unwrap_or(0).max(0);
        (start, count)
    }
}

/// Product ids are digits only. Anything else does not name a product
/// route at all.
fn product_id(raw: &str) -> Result<i32, ApiError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::NotFound);
    }
    raw.parse::<i32>().map_err(|_| ApiError::InvalidId)
}

fn observe<T>(operation: &'static str, start: Instant, result: &Result<T, ApiError>) {
    let status = match result {
        Ok(_) => "ok".to_string(),
        Err(e) => e.status().as_u16().to_string(),
    };
    let labels = [("operation", operation.to_string()), ("status", status)];
    metrics::counter!("products_requests_total", &labels).increment(1);
    metrics::histogram!("products_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

async fn list_products(
    State(state): State<ApiState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let start = Instant::now();
    let (offset, count) = pagination.clamp();
    let result = state
        .store
        .list(offset, count)
        .await
        .map(Json)
        .map_err(ApiError::from);
    observe("getProducts", start, &result);
    result
}

async fn create_product(
    State(state): State<ApiState>,
    payload: Result<Json<Product>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let start = Instant::now();
    let result = async {
        let Json(product) = payload?;
        let created = state.store.create(product).await?;
        Ok::<_, ApiError>((StatusCode::CREATED, Json(created)))
    }
    .await;
    observe("createProduct", start, &result);
    result
}

async fn get_product(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let start = Instant::now();
    let result = async {
        let id = product_id(&id)?;
        Ok::<_, ApiError>(Json(state.store.get(id).await?))
    }
    .await;
    observe("getProduct", start, &result);
    result
}

async fn update_product(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<Product>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let start = Instant::now();
    let result = async {
        let id = product_id(&id)?;
        let Json(product) = payload?;
        Ok::<_, ApiError>(Json(state.store.update(id, product).await?))
    }
    .await;
    observe("updateProduct", start, &result);
    result
}

async fn delete_product(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let start = Instant::now();
    let result = async {
        let id = product_id(&id)?;
        state.store.delete(id).await?;
        Ok::<_, ApiError>(Json(json!({ "result": "success" })))
    }
    .await;
    observe("deleteProduct", start, &result);
    result
}

/// Products CRUD router, with the route inventory its health probe walks.
pub fn router(store: Arc<dyn ProductStore>) -> (Router, RouteTable) {
    let (router, routes) = RouteSet::<ApiState>::new()
        .record("getProducts", Method::GET, PRODUCTS_PATH, list_products)
        .record("createProduct", Method::POST, PRODUCTS_PATH, create_product)
        .record("getProduct", Method::GET, PRODUCT_PATH, get_product)
        .record("updateProduct", Method::PUT, PRODUCT_PATH, update_product)
        .record("deleteProduct", Method::DELETE, PRODUCT_PATH, delete_product)
        .into_router();

    let router = router
        .with_state(ApiState { store })
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics));

    (router, routes)
}
