use crate::domain::ports::CallbacksRef;
use crate::domain::product::Product;
use crate::domain::purchase::FinalizeKind;
use crate::interfaces::wire::ProductRecord;
use tracing::{debug, error};

/// Serializes provider data into wire records and hands every outcome to the
/// outbound callbacks.
#[derive(Clone)]
pub struct ResultDispatcher {
    callbacks: CallbacksRef,
}

impl ResultDispatcher {
    pub fn new(callbacks: CallbacksRef) -> Self {
        Self { callbacks }
    }

    /// Emits one record per product, in order.
    ///
    /// A product that cannot be converted is logged and left out; the rest of
    /// the batch is still delivered.
    pub fn products_queried(&self, products: &[Product]) {
        let records: Vec<String> = products
            .iter()
            .filter_map(|product| match ProductRecord::encode(product) {
                Ok(record) => Some(record),
                Err(e) => {
                    error!("Failed to create JSON for product {}: {}", product.product_id, e);
                    None
                }
            })
            .collect();

        debug!("Sending {} product records", records.len());
        self.callbacks.on_products_queried(records);
    }

    pub fn products_query_failed(&self, diagnostic: String) {
        self.callbacks.on_products_query_failed(diagnostic);
    }

    pub fn purchase_succeeded(&self, receipt: String, signature: String) {
        self.callbacks.on_purchase_succeeded(receipt, signature);
    }

    pub fn purchase_failed(&self, diagnostic: String) {
        self.callbacks.on_purchase_failed(diagnostic);
    }

    pub fn finalized(&self, token: String, kind: FinalizeKind) {
        self.callbacks.on_finalized(token, kind);
    }

    pub fn finalize_failed(&self, token: String, diagnostic: String) {
        self.callbacks.on_finalize_failed(token, diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{PriceOffer, ProductType};
    use crate::infrastructure::channel::{BillingEvent, ChannelCallbacks};
    use std::sync::Arc;

    fn priced(id: &str, currency: &str) -> Product {
        Product::new(id, ProductType::OneTime, id, "").with_offer(PriceOffer {
            price_amount_micros: 990_000,
            formatted_price: "0.99".into(),
            currency_code: currency.into(),
        })
    }

    #[test]
    fn test_bad_record_is_dropped_rest_delivered() {
        let (callbacks, mut rx) = ChannelCallbacks::channel();
        let dispatcher = ResultDispatcher::new(Arc::new(callbacks));

        dispatcher.products_queried(&[
            priced("coin_100", "USD"),
            priced("broken", "us dollars"),
            priced("gem_5", "EUR"),
        ]);

        let Ok(BillingEvent::ProductsQueried { records }) = rx.try_recv() else {
            panic!("expected products_queried");
        };
        assert_eq!(records.len(), 2);
        assert!(records[0].contains("\"ProducID\":\"coin_100\""));
        assert!(records[1].contains("\"ProducID\":\"gem_5\""));
    }

    #[test]
    fn test_query_failure_defaults_to_purchase_failure() {
        struct FailureOnly(std::sync::Mutex<Vec<String>>);

        impl crate::domain::ports::BillingCallbacks for FailureOnly {
            fn on_products_queried(&self, _records: Vec<String>) {}
            fn on_purchase_succeeded(&self, _receipt: String, _signature: String) {}
            fn on_purchase_failed(&self, diagnostic: String) {
                self.0.lock().unwrap().push(diagnostic);
            }
            fn on_finalized(&self, _token: String, _kind: FinalizeKind) {}
            fn on_finalize_failed(&self, _token: String, _diagnostic: String) {}
        }

        let callbacks = Arc::new(FailureOnly(Default::default()));
        let dispatcher = ResultDispatcher::new(callbacks.clone());
        dispatcher.products_query_failed("Service unavailable".into());

        assert_eq!(*callbacks.0.lock().unwrap(), vec!["Service unavailable"]);
    }
}
