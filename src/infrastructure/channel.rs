use crate::domain::ports::BillingCallbacks;
use crate::domain::purchase::FinalizeKind;
use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Every outcome the bridge can report, as delivered over a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BillingEvent {
    ProductsQueried { records: Vec<String> },
    ProductsQueryFailed { diagnostic: String },
    PurchaseSucceeded { receipt: String, signature: String },
    PurchaseFailed { diagnostic: String },
    Finalized { token: String, kind: FinalizeKind },
    FinalizeFailed { token: String, diagnostic: String },
}

/// [`BillingCallbacks`] that forwards each callback as a [`BillingEvent`].
///
/// A closed receiver drops events silently.
#[derive(Clone)]
pub struct ChannelCallbacks {
    tx: UnboundedSender<BillingEvent>,
}

impl ChannelCallbacks {
    pub fn new(tx: UnboundedSender<BillingEvent>) -> Self {
        Self { tx }
    }

    /// Creates the callbacks together with the receiving end.
    pub fn channel() -> (Self, UnboundedReceiver<BillingEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: BillingEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Billing event receiver closed, dropping event");
        }
    }
}

impl BillingCallbacks for ChannelCallbacks {
    fn on_products_queried(&self, records: Vec<String>) {
        self.send(BillingEvent::ProductsQueried { records });
    }

    fn on_products_query_failed(&self, diagnostic: String) {
        self.send(BillingEvent::ProductsQueryFailed { diagnostic });
    }

    fn on_purchase_succeeded(&self, receipt: String, signature: String) {
        self.send(BillingEvent::PurchaseSucceeded { receipt, signature });
    }

    fn on_purchase_failed(&self, diagnostic: String) {
        self.send(BillingEvent::PurchaseFailed { diagnostic });
    }

    fn on_finalized(&self, token: String, kind: FinalizeKind) {
        self.send(BillingEvent::Finalized { token, kind });
    }

    fn on_finalize_failed(&self, token: String, diagnostic: String) {
        self.send(BillingEvent::FinalizeFailed { token, diagnostic });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = BillingEvent::Finalized {
            token: "tok".into(),
            kind: FinalizeKind::Consume,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"event":"finalized","token":"tok","kind":"consume"}"#
        );
    }

    #[test]
    fn test_callbacks_forward_in_order() {
        let (callbacks, mut rx) = ChannelCallbacks::channel();
        callbacks.on_purchase_failed("first".into());
        callbacks.on_finalize_failed("tok".into(), "second".into());

        assert_eq!(
            rx.try_recv().unwrap(),
            BillingEvent::PurchaseFailed {
                diagnostic: "first".into()
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            BillingEvent::FinalizeFailed {
                token: "tok".into(),
                diagnostic: "second".into()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (callbacks, rx) = ChannelCallbacks::channel();
        drop(rx);
        callbacks.on_products_queried(vec![]);
    }
}
