#![allow(dead_code)]

use purchase_bridge::application::session::BillingSession;
use purchase_bridge::config::{SandboxConfig, SessionConfig};
use purchase_bridge::domain::billing::PurchasesUpdate;
use purchase_bridge::domain::ports::PurchaseStoreBox;
use purchase_bridge::domain::product::{PriceOffer, Product, ProductType};
use purchase_bridge::infrastructure::channel::{BillingEvent, ChannelCallbacks};
use purchase_bridge::infrastructure::in_memory::{InMemoryCatalog, InMemoryPurchaseStore};
use purchase_bridge::infrastructure::sandbox::SandboxProvider;
use std::io::{Error, Write};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::mpsc::UnboundedReceiver;

pub const CATALOG_HEADER: &str =
    "product_id, product_type, name, description, price, currency_code, consumable";

/// A session wired to a sandbox storefront, with both channel ends exposed.
pub struct Harness {
    pub session: Arc<BillingSession>,
    pub provider: Arc<SandboxProvider>,
    pub updates: Option<UnboundedReceiver<PurchasesUpdate>>,
    pub events: UnboundedReceiver<BillingEvent>,
}

impl Harness {
    pub fn new(products: Vec<Product>) -> Self {
        Self::with_ledger(products, Box::new(InMemoryPurchaseStore::new()))
    }

    pub fn with_ledger(products: Vec<Product>, ledger: PurchaseStoreBox) -> Self {
        let (provider, updates) = SandboxProvider::new(SandboxConfig::default(), products);
        let provider = Arc::new(provider);
        let (callbacks, events) = ChannelCallbacks::channel();

        let session = Arc::new(BillingSession::new(
            provider.clone(),
            Box::new(InMemoryCatalog::new()),
            ledger,
            Arc::new(callbacks),
            SessionConfig::default(),
        ));

        Self {
            session,
            provider,
            updates: Some(updates),
            events,
        }
    }

    pub async fn drain(&mut self) -> usize {
        match self.updates.as_mut() {
            Some(updates) => self.session.drain_updates(updates).await,
            None => 0,
        }
    }

    /// Everything emitted so far.
    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }
}

pub fn coin_100() -> Product {
    Product::new("coin_100", ProductType::OneTime, "100 Coins", "A pile of coins").with_offer(
        PriceOffer {
            price_amount_micros: 99_000_000,
            formatted_price: "$0.99".into(),
            currency_code: "USD".into(),
        },
    )
}

pub fn priced(product_id: &str, micros: i64) -> Product {
    Product::new(product_id, ProductType::OneTime, product_id, "").with_offer(PriceOffer {
        price_amount_micros: micros,
        formatted_price: format!("{micros} micros"),
        currency_code: "USD".into(),
    })
}

pub fn write_catalog(rows: &[&str]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{CATALOG_HEADER}")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    Ok(file)
}

pub fn write_script(rows: &[&str]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "command, target, mode")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    Ok(file)
}
