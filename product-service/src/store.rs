use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    #[serde(default)]
    pub id: i32,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("product not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for the products API.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// At most `count` products, skipping the first `start`, ordered by id.
    async fn list(&self, start: i64, count: i64) -> Result<Vec<Product>, StoreError>;

    async fn get(&self, id: i32) -> Result<Product, StoreError>;

    /// Inserts the product and returns it with its assigned id. The id of
    /// the input is ignored.
    async fn create(&self, product: Product) -> Result<Product, StoreError>;

    async fn update(&self, id: i32, product: Product) -> Result<Product, StoreError>;

    async fn delete(&self, id: i32) -> Result<(), StoreError>;
}
