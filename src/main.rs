use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use purchase_bridge::application::session::BillingSession;
use purchase_bridge::config::{SandboxConfig, SessionConfig};
use purchase_bridge::domain::ports::PurchaseStoreBox;
use purchase_bridge::domain::product::{Product, ProductType};
use purchase_bridge::domain::purchase::{FinalizeKind, ShopItem};
use purchase_bridge::infrastructure::channel::{BillingEvent, ChannelCallbacks};
use purchase_bridge::infrastructure::in_memory::{InMemoryCatalog, InMemoryPurchaseStore};
use purchase_bridge::infrastructure::sandbox::SandboxProvider;
use purchase_bridge::interfaces::csv::catalog_reader::CatalogReader;
use purchase_bridge::interfaces::csv::command_reader::{Command, CommandKind, CommandReader};
use purchase_bridge::telemetry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, warn};

#[derive(Clone, Copy, ValueEnum)]
enum QueryType {
    Inapp,
    Subs,
}

impl From<QueryType> for ProductType {
    fn from(value: QueryType) -> Self {
        match value {
            QueryType::Inapp => ProductType::OneTime,
            QueryType::Subs => ProductType::Subscription,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Command script CSV (`command, target, mode`)
    script: PathBuf,

    /// Store catalog CSV served by the sandbox storefront
    #[arg(long)]
    catalog: PathBuf,

    /// Path to a persistent purchase ledger (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Launch purchase flows with personalized offers
    #[arg(long)]
    personalized_offers: bool,

    /// Product type attached to catalog queries
    #[arg(long, value_enum, default_value_t = QueryType::Inapp)]
    product_type: QueryType,

    /// Package name written into sandbox receipts
    #[arg(long, default_value = "com.example.game")]
    package_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let cli = Cli::parse();

    let (products, shop_items) = load_catalog(&cli.catalog)?;
    let (provider, mut updates) = SandboxProvider::new(
        SandboxConfig {
            package_name: cli.package_name,
        },
        products,
    );
    let (callbacks, mut events) = ChannelCallbacks::channel();

    let session = BillingSession::new(
        Arc::new(provider),
        Box::new(InMemoryCatalog::new()),
        open_ledger(cli.db_path)?,
        Arc::new(callbacks),
        SessionConfig {
            product_type: cli.product_type.into(),
            offer_personalized: cli.personalized_offers,
        },
    );
    if let Err(e) = session.connect().await {
        warn!("Starting without a billing connection: {}", e);
    }

    let file = File::open(cli.script).into_diagnostic()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for command in CommandReader::new(file).commands() {
        match command {
            Ok(command) => run_command(&session, &shop_items, command).await,
            Err(e) => error!("Error reading command: {}", e),
        }
        session.drain_updates(&mut updates).await;
        write_events(&mut out, &mut events)?;
    }

    Ok(())
}

fn load_catalog(path: &Path) -> Result<(Vec<Product>, HashMap<String, ShopItem>)> {
    let file = File::open(path).into_diagnostic()?;
    let mut products = Vec::new();
    let mut shop_items = HashMap::new();

    for entry in CatalogReader::new(file).entries() {
        let entry = entry.into_diagnostic()?;
        products.push(entry.to_product().into_diagnostic()?);
        let item = entry.shop_item();
        shop_items.insert(item.product_id.clone(), item);
    }

    Ok((products, shop_items))
}

#[cfg(feature = "storage-rocksdb")]
fn open_ledger(db_path: Option<PathBuf>) -> Result<PurchaseStoreBox> {
    use purchase_bridge::infrastructure::rocksdb::RocksDBPurchaseStore;

    match db_path {
        Some(path) => Ok(Box::new(RocksDBPurchaseStore::open(path).into_diagnostic()?)),
        None => Ok(Box::new(InMemoryPurchaseStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_ledger(db_path: Option<PathBuf>) -> Result<PurchaseStoreBox> {
    if db_path.is_some() {
        warn!(
            "Persistent purchase ledger requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory ledger."
        );
    }
    Ok(Box::new(InMemoryPurchaseStore::new()))
}

async fn run_command(
    session: &BillingSession,
    shop_items: &HashMap<String, ShopItem>,
    command: Command,
) {
    let outcome = match command.command {
        CommandKind::Query => session.query_products(&command.product_ids()).await,
        CommandKind::Purchase => session.purchase(&command.target).await,
        CommandKind::Finalize => {
            let kind = match command.mode {
                Some(kind) => kind,
                None => finalize_kind_for(session, shop_items, &command.target).await,
            };
            session.finalize(&command.target, kind.is_consume()).await
        }
    };

    // Failures were already reported as events.
    if let Err(e) = outcome {
        debug!("{:?} {} failed: {}", command.command, command.target, e);
    }
}

/// Picks consume or acknowledge from the shop item of the purchased product.
async fn finalize_kind_for(
    session: &BillingSession,
    shop_items: &HashMap<String, ShopItem>,
    token: &str,
) -> FinalizeKind {
    let product_id = match session.purchase_record(token).await {
        Ok(record) => record.and_then(|purchase| purchase.product_id),
        Err(e) => {
            warn!("Failed to read purchase ledger: {}", e);
            None
        }
    };
    FinalizeKind::for_item(product_id.and_then(|id| shop_items.get(&id)))
}

fn write_events(out: &mut impl Write, events: &mut UnboundedReceiver<BillingEvent>) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        let line = serde_json::to_string(&event).into_diagnostic()?;
        writeln!(out, "{}", line).into_diagnostic()?;
    }
    Ok(())
}
