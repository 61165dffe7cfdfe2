use crate::application::session::BillingSession;
use crate::error::{BridgeError, Result};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Inbound boundary for the engine: fire-and-forget calls forwarded to the
/// current [`BillingSession`].
///
/// Calls made before [`BillingBridge::init`] are logged and dropped. Every
/// call spawns onto the tokio runtime of the calling thread and returns at
/// once; results arrive through the session's callbacks.
#[derive(Default)]
pub struct BillingBridge {
    session: RwLock<Option<Arc<BillingSession>>>,
}

impl BillingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&self, session: Arc<BillingSession>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        info!("Billing bridge initialized");
    }

    /// Detaches the current session, if any.
    pub fn shutdown(&self) -> Option<Arc<BillingSession>> {
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_initialized(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn session(&self) -> Result<Arc<BillingSession>> {
        let session = self
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        session.ok_or_else(|| {
            error!("No billing session initialized!");
            BridgeError::NotInitialized
        })
    }

    fn spawn<F>(
        &self,
        operation: &'static str,
        run: impl FnOnce(Arc<BillingSession>) -> F,
    ) -> Result<JoinHandle<()>>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let session = self.session()?;
        let runtime = Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;
        let task = run(session);

        Ok(runtime.spawn(async move {
            // Failures were already delivered to the callbacks.
            if let Err(e) = task.await {
                debug!("{} finished with error: {}", operation, e);
            }
        }))
    }

    pub fn query_products(&self, product_ids: Vec<String>) -> Result<JoinHandle<()>> {
        self.spawn("query_products", move |session| async move {
            session.query_products(&product_ids).await
        })
    }

    pub fn purchase(&self, product_id: String) -> Result<JoinHandle<()>> {
        self.spawn("purchase", move |session| async move {
            session.purchase(&product_id).await
        })
    }

    pub fn finalize_purchase(&self, token: String, consume: bool) -> Result<JoinHandle<()>> {
        self.spawn("finalize_purchase", move |session| async move {
            session.finalize(&token, consume).await
        })
    }
}
