use crate::config::SandboxConfig;
use crate::domain::billing::{
    BillingFlowParams, BillingResult, ProductDetailsResponse, ProductQuery, ProviderPurchase,
    PurchasesUpdate, ResponseCode,
};
use crate::domain::ports::BillingProvider;
use crate::domain::product::Product;
use crate::domain::purchase::{RECEIPT_STATE_PURCHASED, Receipt};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Provider operations, used for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOp {
    Connect,
    Query,
    /// The immediate result of launching a purchase flow.
    Launch,
    /// The purchase-updated event produced by a launched flow.
    PurchaseFlow,
    Consume,
    Acknowledge,
}

#[derive(Debug)]
struct IssuedPurchase {
    product_id: String,
    consumed: bool,
    acknowledged: bool,
}

#[derive(Debug, Default)]
struct SandboxState {
    next_purchase: u64,
    issued: HashMap<String, IssuedPurchase>,
    /// Products owned and not yet consumed.
    owned: HashSet<String>,
    injected: HashMap<ProviderOp, BillingResult>,
    calls: HashMap<ProviderOp, usize>,
}

/// An in-process storefront implementing [`BillingProvider`].
///
/// Tokens are deterministic (`sandbox.<product>.<n>`), purchase results are
/// published on the listener channel handed out by [`SandboxProvider::new`].
pub struct SandboxProvider {
    config: SandboxConfig,
    products: Vec<Product>,
    listener: UnboundedSender<PurchasesUpdate>,
    connected: AtomicBool,
    state: Mutex<SandboxState>,
}

impl SandboxProvider {
    /// Creates the sandbox and the receiving end of its purchase-updated channel.
    pub fn new(
        config: SandboxConfig,
        products: Vec<Product>,
    ) -> (Self, UnboundedReceiver<PurchasesUpdate>) {
        let (listener, rx) = unbounded_channel();
        let provider = Self {
            config,
            products,
            listener,
            connected: AtomicBool::new(false),
            state: Mutex::new(SandboxState::default()),
        };
        (provider, rx)
    }

    /// Makes the next call of `op` report `result` instead of running.
    pub fn inject_failure(&self, op: ProviderOp, result: BillingResult) {
        self.state().injected.insert(op, result);
    }

    /// Drops the connection; the next call fails until it is restarted.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn call_count(&self, op: ProviderOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    fn state(&self) -> MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call and returns an injected or connection failure, if any.
    fn begin(&self, op: ProviderOp) -> Option<BillingResult> {
        let mut state = self.state();
        *state.calls.entry(op).or_default() += 1;
        if let Some(result) = state.injected.remove(&op) {
            return Some(result);
        }
        if op != ProviderOp::Connect && !self.is_ready() {
            return Some(BillingResult::new(
                ResponseCode::ServiceDisconnected,
                "Service disconnected",
            ));
        }
        None
    }

    fn publish(&self, update: PurchasesUpdate) {
        if self.listener.send(update).is_err() {
            tracing::warn!("Sandbox purchase listener closed, dropping purchase update");
        }
    }

    fn issue_purchase(&self, product_id: &str) -> Result<ProviderPurchase, BillingResult> {
        let mut state = self.state();
        state.next_purchase += 1;
        let n = state.next_purchase;

        let token = format!("sandbox.{product_id}.{n}");
        let receipt = Receipt {
            order_id: Some(format!("GPA.SANDBOX-{n:04}")),
            package_name: self.config.package_name.clone(),
            product_id: product_id.to_string(),
            purchase_time: now_millis(),
            purchase_state: RECEIPT_STATE_PURCHASED,
            purchase_token: token.clone(),
            quantity: 1,
            acknowledged: false,
        };
        let original_json = serde_json::to_string(&receipt)
            .map_err(|e| BillingResult::new(ResponseCode::Error, e.to_string()))?;

        state.issued.insert(
            token,
            IssuedPurchase {
                product_id: product_id.to_string(),
                consumed: false,
                acknowledged: false,
            },
        );
        state.owned.insert(product_id.to_string());

        Ok(ProviderPurchase {
            original_json,
            signature: format!("sandbox-signature-{n}"),
        })
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn not_owned() -> BillingResult {
    BillingResult::new(ResponseCode::ItemNotOwned, "Item not owned by user")
}

#[async_trait]
impl BillingProvider for SandboxProvider {
    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn start_connection(&self) -> BillingResult {
        if let Some(failure) = self.begin(ProviderOp::Connect) {
            return failure;
        }
        self.connected.store(true, Ordering::SeqCst);
        BillingResult::ok()
    }

    async fn query_product_details(&self, products: Vec<ProductQuery>) -> ProductDetailsResponse {
        if let Some(failure) = self.begin(ProviderOp::Query) {
            return ProductDetailsResponse {
                result: failure,
                products: Vec::new(),
            };
        }

        let found = products
            .iter()
            .filter_map(|query| {
                self.products.iter().find(|p| {
                    p.product_id == query.product_id && p.product_type == query.product_type
                })
            })
            .cloned()
            .collect();

        ProductDetailsResponse {
            result: BillingResult::ok(),
            products: found,
        }
    }

    async fn launch_billing_flow(&self, params: BillingFlowParams) -> BillingResult {
        if let Some(failure) = self.begin(ProviderOp::Launch) {
            return failure;
        }

        let product_id = params.product.product_id.as_str();
        if !self.products.iter().any(|p| p.product_id == product_id) {
            return BillingResult::new(
                ResponseCode::ItemUnavailable,
                "Item is not available for purchase",
            );
        }

        let injected = self.state().injected.remove(&ProviderOp::PurchaseFlow);
        let already_owned = self.state().owned.contains(product_id);

        let update = if let Some(result) = injected {
            PurchasesUpdate {
                result,
                purchases: Vec::new(),
            }
        } else if already_owned {
            PurchasesUpdate {
                result: BillingResult::new(
                    ResponseCode::ItemAlreadyOwned,
                    "Item is already owned",
                ),
                purchases: Vec::new(),
            }
        } else {
            match self.issue_purchase(product_id) {
                Ok(purchase) => PurchasesUpdate {
                    result: BillingResult::ok(),
                    purchases: vec![purchase],
                },
                Err(result) => PurchasesUpdate {
                    result,
                    purchases: Vec::new(),
                },
            }
        };

        self.publish(update);
        BillingResult::ok()
    }

    async fn consume(&self, purchase_token: &str) -> BillingResult {
        if let Some(failure) = self.begin(ProviderOp::Consume) {
            return failure;
        }

        let mut state = self.state();
        let product_id = match state.issued.get_mut(purchase_token) {
            Some(issued) if !issued.consumed => {
                issued.consumed = true;
                issued.product_id.clone()
            }
            _ => return not_owned(),
        };
        state.owned.remove(&product_id);
        BillingResult::ok()
    }

    async fn acknowledge(&self, purchase_token: &str) -> BillingResult {
        if let Some(failure) = self.begin(ProviderOp::Acknowledge) {
            return failure;
        }

        match self.state().issued.get_mut(purchase_token) {
            Some(issued) if !issued.consumed => {
                issued.acknowledged = true;
                BillingResult::ok()
            }
            _ => not_owned(),
        }
    }
}
