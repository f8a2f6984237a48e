use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use health::Probe;
use lifecycle::{LifecycleError, Subsystem};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::{ConnectOptions, Connection};
use tracing::{info, instrument};

use crate::app::Datastore;
use crate::config::DbConfig;
use crate::store::{Product, ProductStore, StoreError};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS products
(
    id SERIAL,
    name TEXT NOT NULL,
    price NUMERIC(10,2) NOT NULL DEFAULT 0.00,
    CONSTRAINT products_pkey PRIMARY KEY (id)
)";

pub fn connect_options(config: &DbConfig, traced: bool) -> Result<PgConnectOptions, sqlx::Error> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.name)
        .ssl_mode(config.ssl_mode.parse::<PgSslMode>()?);

    // Statements are only worth logging when they end up in traces.
    Ok(if traced {
        options
    } else {
        options.disable_statement_logging()
    })
}

/// Products table on Postgres.
#[derive(Clone)]
pub struct PgProducts {
    pool: PgPool,
}

impl PgProducts {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProducts {
    #[instrument(skip(self))]
    async fn list(&self, start: i64, count: i64) -> Result<Vec<Product>, StoreError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, price::float8 AS price FROM products ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(count)
        .bind(start)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i32) -> Result<Product, StoreError> {
        sqlx::query_as::<_, Product>(
            "SELECT id, name, price::float8 AS price FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self))]
    async fn create(&self, product: Product) -> Result<Product, StoreError> {
        let id: i32 =
            sqlx::query_scalar("INSERT INTO products(name, price) VALUES($1, $2) RETURNING id")
                .bind(&product.name)
                .bind(product.price)
                .fetch_one(&self.pool)
                .await?;
        Ok(Product { id, ..product })
    }

    #[instrument(skip(self))]
    async fn update(&self, id: i32, product: Product) -> Result<Product, StoreError> {
        let result = sqlx::query("UPDATE products SET name = $1, price = $2 WHERE id = $3")
            .bind(&product.name)
            .bind(product.price)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(Product { id, ..product })
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// The `db` subsystem: owns the connection pool shared by the API and the
/// datastore probe.
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Opens the pool and makes sure the products table exists.
    pub async fn connect(config: &DbConfig, traced: bool) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_options(config, traced)?)
            .await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            "connected to database"
        );
        Ok(Self { pool })
    }
}

impl Datastore for Database {
    fn store(&self) -> Arc<dyn ProductStore> {
        Arc::new(PgProducts::new(self.pool.clone()))
    }

    fn probe(&self) -> Arc<dyn Probe> {
        Arc::new(DatastoreProbe::new(Some(self.pool.clone())))
    }

    fn into_subsystem(self: Box<Self>) -> Box<dyn Subsystem> {
        self
    }
}

#[async_trait]
impl Subsystem for Database {
    fn name(&self) -> &str {
        "db"
    }

    async fn shutdown(&mut self, grace: Duration) -> Result<(), LifecycleError> {
        if self.pool.is_closed() {
            return Err(LifecycleError::NotRunning("db".to_string()));
        }
        // Waits for checked out connections to come back.
        tokio::time::timeout(grace, self.pool.close())
            .await
            .map_err(|_| LifecycleError::ShutdownTimeout {
                name: "db".to_string(),
                grace,
            })?;
        info!("database connection closed");
        Ok(())
    }
}

async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;
    conn.ping().await
}

/// Pings the database through the pool.
pub struct DatastoreProbe {
    pool: Option<PgPool>,
}

impl DatastoreProbe {
    pub fn new(pool: Option<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Probe for DatastoreProbe {
    async fn check(&self) -> Result<String, String> {
        let pool = match &self.pool {
            Some(pool) if !pool.is_closed() => pool,
            _ => return Err("DB interface not initialized".to_string()),
        };

        match ping(pool).await {
            Ok(()) => Ok("DB interface healthy".to_string()),
            Err(e) => Err(format!("DB interface NOT HEALTHY: {e}")),
        }
    }
}
