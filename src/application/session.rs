use crate::application::dispatcher::ResultDispatcher;
use crate::config::SessionConfig;
use crate::domain::billing::{BillingFlowParams, ProductQuery, ProviderPurchase, PurchasesUpdate};
use crate::domain::ports::{CallbacksRef, CatalogStoreBox, ProviderRef, PurchaseStoreBox};
use crate::domain::product::Product;
use crate::domain::purchase::{FinalizeKind, Purchase};
use crate::error::{BridgeError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Owns the connection to the billing provider and sequences catalog
/// queries, purchases and finalization.
///
/// Every outcome, success or failure, is reported through the
/// [`ResultDispatcher`]. The `Result` returned by each operation mirrors what
/// was dispatched so in-process callers can await it directly.
pub struct BillingSession {
    provider: ProviderRef,
    catalog: CatalogStoreBox,
    purchases: PurchaseStoreBox,
    dispatcher: ResultDispatcher,
    config: SessionConfig,
    finalizing: Mutex<HashSet<String>>,
    /// Tokens the provider finalized but the ledger failed to record.
    unrecorded: Mutex<HashSet<String>>,
}

/// Marks a token as being finalized until dropped.
struct FinalizeClaim<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    token: String,
}

impl Drop for FinalizeClaim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.token);
    }
}

impl BillingSession {
    /// Creates a new `BillingSession`.
    ///
    /// # Arguments
    ///
    /// * `provider` - The billing provider; its connection is started by [`BillingSession::connect`].
    /// * `catalog` - Cache of queried products.
    /// * `purchases` - Ledger of observed purchases.
    /// * `callbacks` - Receiver of every billing outcome.
    pub fn new(
        provider: ProviderRef,
        catalog: CatalogStoreBox,
        purchases: PurchaseStoreBox,
        callbacks: CallbacksRef,
        config: SessionConfig,
    ) -> Self {
        Self {
            provider,
            catalog,
            purchases,
            dispatcher: ResultDispatcher::new(callbacks),
            config,
            finalizing: Mutex::new(HashSet::new()),
            unrecorded: Mutex::new(HashSet::new()),
        }
    }

    /// Starts the provider connection.
    pub async fn connect(&self) -> Result<()> {
        debug!("Billing connecting..");
        let result = self.provider.start_connection().await;
        if result.is_ok() {
            info!("Billing connected");
            Ok(())
        } else {
            warn!("Billing connection failed: {}", result.diagnostic());
            Err(result.into_error())
        }
    }

    /// Reconnects lazily; a dropped connection is only restored by the next operation.
    async fn ensure_connected(&self) -> Result<()> {
        if self.provider.is_ready() {
            return Ok(());
        }
        info!("Billing disconnected, reconnecting");
        self.connect().await
    }

    /// Queries product details for `product_ids` in one batch, caches every
    /// returned product and emits them as wire records.
    pub async fn query_products(&self, product_ids: &[String]) -> Result<()> {
        match self.query_products_inner(product_ids).await {
            Ok(products) => {
                self.dispatcher.products_queried(&products);
                Ok(())
            }
            Err(e) => {
                warn!("Query error: {}", e);
                self.dispatcher.products_query_failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn query_products_inner(&self, product_ids: &[String]) -> Result<Vec<Product>> {
        debug!("Query products: {:?}", product_ids);
        if product_ids.is_empty() {
            return Err(BridgeError::EmptyQuery);
        }
        self.ensure_connected().await?;

        let queries = product_ids
            .iter()
            .map(|id| ProductQuery {
                product_id: id.clone(),
                product_type: self.config.product_type,
            })
            .collect();

        let response = self.provider.query_product_details(queries).await;
        if !response.result.is_ok() {
            return Err(response.result.into_error());
        }

        info!("Query success. Amount of products: {}", response.products.len());
        for product in &response.products {
            self.catalog.put(product.clone()).await?;
        }
        Ok(response.products)
    }

    /// Launches the purchase flow for a cached product.
    ///
    /// Only the launch is confirmed here; the purchase result arrives through
    /// [`BillingSession::on_purchases_updated`].
    pub async fn purchase(&self, product_id: &str) -> Result<()> {
        let outcome = self.purchase_inner(product_id).await;
        if let Err(e) = &outcome {
            self.dispatcher.purchase_failed(e.to_string());
        }
        outcome
    }

    async fn purchase_inner(&self, product_id: &str) -> Result<()> {
        debug!("Start purchase: {}", product_id);
        let Some(product) = self.catalog.get(product_id).await? else {
            warn!("No details for purchase: {}", product_id);
            return Err(BridgeError::UnknownProduct(product_id.to_string()));
        };
        self.ensure_connected().await?;

        let result = self
            .provider
            .launch_billing_flow(BillingFlowParams {
                product,
                offer_personalized: self.config.offer_personalized,
            })
            .await;
        if !result.is_ok() {
            return Err(result.into_error());
        }
        debug!("Purchase flow launched: {}", product_id);
        Ok(())
    }

    /// Consumes (`consume == true`) or acknowledges the purchase behind `token`.
    ///
    /// A token is finalized at most once: already finalized tokens and tokens
    /// with a finalization in flight are rejected without reaching the provider.
    pub async fn finalize(&self, token: &str, consume: bool) -> Result<()> {
        let kind = FinalizeKind::from_consume(consume);
        match self.finalize_inner(token, kind).await {
            Ok(()) => {
                info!("Purchase finalized ({}): {}", kind, token);
                self.dispatcher.finalized(token.to_string(), kind);
                Ok(())
            }
            Err(e) => {
                warn!("Finalize error for {}: {}", token, e);
                self.dispatcher.finalize_failed(token.to_string(), e.to_string());
                Err(e)
            }
        }
    }

    async fn finalize_inner(&self, token: &str, kind: FinalizeKind) -> Result<()> {
        debug!("Finalizing purchase ({}): {}", kind, token);
        let _claim = self.claim(token)?;

        if self.is_unrecorded(token) {
            return Err(BridgeError::AlreadyFinalized(token.to_string()));
        }
        let existing = self.purchases.get(token).await?;
        if existing.as_ref().is_some_and(Purchase::is_finalized) {
            return Err(BridgeError::AlreadyFinalized(token.to_string()));
        }
        self.ensure_connected().await?;

        let result = match kind {
            FinalizeKind::Consume => self.provider.consume(token).await,
            FinalizeKind::Acknowledge => self.provider.acknowledge(token).await,
        };
        if !result.is_ok() {
            return Err(result.into_error());
        }

        // The token is finalized provider-side from here on.
        if let Err(e) = self.purchases.mark_finalized(token).await {
            error!("Purchase {} finalized but not recorded: {}", token, e);
            self.unrecorded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(token.to_string());
        }
        Ok(())
    }

    fn is_unrecorded(&self, token: &str) -> bool {
        self.unrecorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(token)
    }

    fn claim(&self, token: &str) -> Result<FinalizeClaim<'_>> {
        let mut in_flight = self
            .finalizing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(token.to_string()) {
            return Err(BridgeError::FinalizeInFlight(token.to_string()));
        }
        Ok(FinalizeClaim {
            in_flight: &self.finalizing,
            token: token.to_string(),
        })
    }

    /// Handles the provider's purchase-updated event.
    ///
    /// An `ok` update emits one success per purchase in the reported order;
    /// anything else, including an `ok` update without purchases, emits a
    /// single failure.
    pub async fn on_purchases_updated(&self, update: PurchasesUpdate) {
        if !update.result.is_ok() || update.purchases.is_empty() {
            let diagnostic = if update.result.is_ok() {
                "no purchases reported".to_string()
            } else {
                update.result.diagnostic()
            };
            warn!("Purchase error: {}", diagnostic);
            self.dispatcher.purchase_failed(diagnostic);
            return;
        }

        for purchase in update.purchases {
            debug!("Purchase successful: {}", purchase.original_json);
            self.record_purchase(&purchase).await;
            self.dispatcher
                .purchase_succeeded(purchase.original_json, purchase.signature);
        }
    }

    async fn record_purchase(&self, reported: &ProviderPurchase) {
        let purchase = match Purchase::from_receipt(&reported.original_json, &reported.signature) {
            Ok(purchase) => purchase,
            Err(e) => {
                warn!("Purchase not recorded: {}", e);
                return;
            }
        };

        match self.purchases.record(purchase).await {
            Ok(entry) if entry.is_finalized() => {
                debug!("Purchase already finalized: {}", entry.token);
            }
            Ok(_) => {}
            Err(e) => error!("Failed to record purchase: {}", e),
        }
    }

    /// Processes purchase updates on a background task until the provider
    /// closes its channel.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut updates: UnboundedReceiver<PurchasesUpdate>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                session.on_purchases_updated(update).await;
            }
            debug!("Purchase listener stopped");
        })
    }

    /// Processes every purchase update already queued, returning how many were handled.
    pub async fn drain_updates(&self, updates: &mut UnboundedReceiver<PurchasesUpdate>) -> usize {
        let mut handled = 0;
        while let Ok(update) = updates.try_recv() {
            self.on_purchases_updated(update).await;
            handled += 1;
        }
        handled
    }

    pub async fn product(&self, product_id: &str) -> Result<Option<Product>> {
        self.catalog.get(product_id).await
    }

    pub async fn purchase_record(&self, token: &str) -> Result<Option<Purchase>> {
        self.purchases.get(token).await
    }

    pub async fn cached_products(&self) -> Result<usize> {
        self.catalog.len().await
    }
}
