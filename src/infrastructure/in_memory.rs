use crate::domain::ports::{CatalogStore, PurchaseStore};
use crate::domain::product::Product;
use crate::domain::purchase::Purchase;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory catalog cache.
///
/// Uses `Arc<RwLock<HashMap<String, Product>>>` so a query response can write
/// while a purchase lookup reads. Writes are plain inserts, last write wins.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<String, Product>>>,
}

impl InMemoryCatalog {
    /// Creates a new, empty catalog.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn put(&self, product: Product) -> Result<()> {
        let mut products = self.products.write().await;
        products.insert(product.product_id.clone(), product);
        Ok(())
    }

    async fn get(&self, product_id: &str) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.get(product_id).cloned())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.products.read().await.len())
    }
}

/// A thread-safe in-memory purchase ledger.
#[derive(Default, Clone)]
pub struct InMemoryPurchaseStore {
    purchases: Arc<RwLock<HashMap<String, Purchase>>>,
}

impl InMemoryPurchaseStore {
    /// Creates a new, empty ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PurchaseStore for InMemoryPurchaseStore {
    async fn store(&self, purchase: Purchase) -> Result<()> {
        let mut purchases = self.purchases.write().await;
        purchases.insert(purchase.token.clone(), purchase);
        Ok(())
    }

    async fn record(&self, purchase: Purchase) -> Result<Purchase> {
        let mut purchases = self.purchases.write().await;
        let entry = Purchase::reconcile(purchases.remove(&purchase.token), purchase);
        purchases.insert(entry.token.clone(), entry.clone());
        Ok(entry)
    }

    async fn mark_finalized(&self, token: &str) -> Result<Purchase> {
        let mut purchases = self.purchases.write().await;
        let entry = Purchase::into_finalized(purchases.remove(token), token);
        purchases.insert(entry.token.clone(), entry.clone());
        Ok(entry)
    }

    async fn get(&self, token: &str) -> Result<Option<Purchase>> {
        let purchases = self.purchases.read().await;
        Ok(purchases.get(token).cloned())
    }

    async fn all(&self) -> Result<Vec<Purchase>> {
        let purchases = self.purchases.read().await;
        Ok(purchases.values().cloned().collect())
    }
}
