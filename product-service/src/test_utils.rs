use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use health::Probe;
use lifecycle::{LifecycleError, Subsystem};

use crate::app::Datastore;
use crate::store::{Product, ProductStore, StoreError};

/// In-memory products table, ids assigned from 1.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryTable>,
}

#[derive(Default)]
struct MemoryTable {
    next_id: i32,
    rows: BTreeMap<i32, Product>,
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list(&self, start: i64, count: i64) -> Result<Vec<Product>, StoreError> {
        let table = self.inner.lock().unwrap();
        Ok(table
            .rows
            .values()
            .skip(start as usize)
            .take(count as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, id: i32) -> Result<Product, StoreError> {
        let table = self.inner.lock().unwrap();
        table.rows.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn create(&self, product: Product) -> Result<Product, StoreError> {
        let mut table = self.inner.lock().unwrap();
        table.next_id += 1;
        let product = Product {
            id: table.next_id,
            ..product
        };
        table.rows.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(&self, id: i32, product: Product) -> Result<Product, StoreError> {
        let mut table = self.inner.lock().unwrap();
        let row = table.rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        *row = Product { id, ..product };
        Ok(row.clone())
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        let mut table = self.inner.lock().unwrap();
        table.rows.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

/// Datastore subsystem backed by [`MemoryStore`]. Its probe can be slowed
/// down to stand in for a wedged database.
pub struct MemoryDatastore {
    store: Arc<MemoryStore>,
    open: Arc<AtomicBool>,
    probe_delay: Duration,
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::with_probe_delay(Duration::ZERO)
    }
}

impl MemoryDatastore {
    pub fn with_probe_delay(probe_delay: Duration) -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            open: Arc::new(AtomicBool::new(true)),
            probe_delay,
        }
    }
}

impl Datastore for MemoryDatastore {
    fn store(&self) -> Arc<dyn ProductStore> {
        self.store.clone()
    }

    fn probe(&self) -> Arc<dyn Probe> {
        Arc::new(MemoryProbe {
            open: self.open.clone(),
            delay: self.probe_delay,
        })
    }

    fn into_subsystem(self: Box<Self>) -> Box<dyn Subsystem> {
        self
    }
}

#[async_trait]
impl Subsystem for MemoryDatastore {
    fn name(&self) -> &str {
        "db"
    }

    async fn shutdown(&mut self, _grace: Duration) -> Result<(), LifecycleError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Err(LifecycleError::NotRunning("db".to_string()));
        }
        Ok(())
    }
}

struct MemoryProbe {
    open: Arc<AtomicBool>,
    delay: Duration,
}

#[async_trait]
impl Probe for MemoryProbe {
    async fn check(&self) -> Result<String, String> {
        if !self.open.load(Ordering::SeqCst) {
            return Err("DB interface not initialized".to_string());
        }
        tokio::time::sleep(self.delay).await;
        Ok("DB interface healthy".to_string())
    }
}
