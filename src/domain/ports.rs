use super::billing::{BillingFlowParams, BillingResult, ProductDetailsResponse, ProductQuery};
use super::product::Product;
use super::purchase::{FinalizeKind, Purchase};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Last-fetched product metadata, keyed by product identifier.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Stores or overwrites the product under its identifier.
    async fn put(&self, product: Product) -> Result<()>;
    async fn get(&self, product_id: &str) -> Result<Option<Product>>;
    async fn len(&self) -> Result<usize>;
}

/// Purchases observed by the bridge, keyed by purchase token.
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Overwrites the entry for the purchase token.
    async fn store(&self, purchase: Purchase) -> Result<()>;
    /// Records a provider report in one atomic step, returning the resulting
    /// entry. A finalized entry is never regressed (see [`Purchase::reconcile`]).
    async fn record(&self, purchase: Purchase) -> Result<Purchase>;
    /// Marks `token` finalized in one atomic step, creating the entry when missing.
    async fn mark_finalized(&self, token: &str) -> Result<Purchase>;
    async fn get(&self, token: &str) -> Result<Option<Purchase>>;
    async fn all(&self) -> Result<Vec<Purchase>>;
}

/// The external billing provider.
///
/// Purchase results are not returned from [`BillingProvider::launch_billing_flow`];
/// they arrive later on the provider's purchase-updated channel.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    fn is_ready(&self) -> bool;
    async fn start_connection(&self) -> BillingResult;
    async fn query_product_details(&self, products: Vec<ProductQuery>) -> ProductDetailsResponse;
    async fn launch_billing_flow(&self, params: BillingFlowParams) -> BillingResult;
    async fn consume(&self, purchase_token: &str) -> BillingResult;
    async fn acknowledge(&self, purchase_token: &str) -> BillingResult;
}

/// Outbound interface receiving every billing outcome.
///
/// Implementations are invoked from whatever task completed the provider call.
pub trait BillingCallbacks: Send + Sync {
    fn on_products_queried(&self, records: Vec<String>);

    fn on_products_query_failed(&self, diagnostic: String) {
        self.on_purchase_failed(diagnostic);
    }

    fn on_purchase_succeeded(&self, receipt: String, signature: String);

    fn on_purchase_failed(&self, diagnostic: String);

    fn on_finalized(&self, token: String, kind: FinalizeKind);

    fn on_finalize_failed(&self, token: String, diagnostic: String);
}

pub type CatalogStoreBox = Box<dyn CatalogStore>;
pub type PurchaseStoreBox = Box<dyn PurchaseStore>;
pub type ProviderRef = Arc<dyn BillingProvider>;
pub type CallbacksRef = Arc<dyn BillingCallbacks>;
