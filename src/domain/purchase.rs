use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Receipt value of `purchaseState` for a completed purchase.
pub const RECEIPT_STATE_PURCHASED: i32 = 0;
/// Receipt value of `purchaseState` for a purchase awaiting payment.
pub const RECEIPT_STATE_PENDING: i32 = 4;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseState {
    Pending,
    Purchased,
    Finalized,
}

/// A purchase observed by the bridge, keyed by its token.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Purchase {
    pub token: String,
    pub product_id: Option<String>,
    /// Receipt payload exactly as the provider reported it.
    pub receipt: String,
    pub signature: String,
    pub state: PurchaseState,
}

impl Purchase {
    /// Builds a ledger entry from a provider receipt.
    pub fn from_receipt(receipt: &str, signature: &str) -> Result<Self> {
        let parsed = Receipt::parse(receipt)?;
        let state = if parsed.purchase_state == RECEIPT_STATE_PURCHASED {
            PurchaseState::Purchased
        } else {
            PurchaseState::Pending
        };

        Ok(Self {
            token: parsed.purchase_token,
            product_id: Some(parsed.product_id),
            receipt: receipt.to_string(),
            signature: signature.to_string(),
            state,
        })
    }

    /// Ledger entry for a token finalized without a receipt seen in this session.
    pub fn finalized_token(token: &str) -> Self {
        Self {
            token: token.to_string(),
            product_id: None,
            receipt: String::new(),
            signature: String::new(),
            state: PurchaseState::Finalized,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.state == PurchaseState::Finalized
    }

    /// Applies a provider report to the ledger entry held for the same token.
    ///
    /// A finalized entry stays finalized; it only adopts the receipt when it
    /// was finalized before any report was seen.
    pub fn reconcile(existing: Option<Self>, reported: Self) -> Self {
        match existing {
            Some(mut entry) if entry.is_finalized() => {
                if entry.product_id.is_none() {
                    entry.product_id = reported.product_id;
                    entry.receipt = reported.receipt;
                    entry.signature = reported.signature;
                }
                entry
            }
            _ => reported,
        }
    }

    /// The ledger entry for `token` once the provider confirmed finalization.
    pub fn into_finalized(existing: Option<Self>, token: &str) -> Self {
        match existing {
            Some(mut entry) => {
                entry.state = PurchaseState::Finalized;
                entry
            }
            None => Self::finalized_token(token),
        }
    }
}

/// The provider's receipt payload.
///
/// ```json
/// {"orderId":"GPA.3386-2124-6888-54771","packageName":"com.example.game",
///  "productId":"coin_100","purchaseTime":1665439535789,"purchaseState":0,
///  "purchaseToken":"okcconnmngpeffhfokpmpbie","quantity":1,"acknowledged":false}
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Absent for test purchases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub package_name: String,
    pub product_id: String,
    pub purchase_time: i64,
    pub purchase_state: i32,
    pub purchase_token: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub acknowledged: bool,
}

fn default_quantity() -> u32 {
    1
}

impl Receipt {
    pub fn parse(receipt: &str) -> Result<Self> {
        serde_json::from_str(receipt).map_err(BridgeError::Receipt)
    }
}

/// How a purchase is finalized with the provider.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum FinalizeKind {
    /// Invalidates the token so the product can be bought again.
    Consume,
    /// Confirms a non-consumable or subscription purchase.
    Acknowledge,
}

/// Custom-data key carrying the finalize kind alongside a purchase.
pub const FINALIZE_TYPE_KEY: &str = "FinalizeType";

impl FinalizeKind {
    pub fn from_consume(consume: bool) -> Self {
        if consume { Self::Consume } else { Self::Acknowledge }
    }

    pub fn is_consume(self) -> bool {
        self == Self::Consume
    }

    /// Consumables are consumed; items without shop data default to consume.
    pub fn for_item(item: Option<&ShopItem>) -> Self {
        match item {
            Some(item) if !item.consumable => Self::Acknowledge,
            _ => Self::Consume,
        }
    }

    /// Reads the `FinalizeType` entry (`Consume` / `Acknowledge`) of a purchase's custom data.
    pub fn from_custom_data(custom_data: &BTreeMap<String, String>) -> Option<Self> {
        match custom_data.get(FINALIZE_TYPE_KEY)?.as_str() {
            "Consume" => Some(Self::Consume),
            "Acknowledge" => Some(Self::Acknowledge),
            _ => None,
        }
    }

    pub fn custom_data_value(self) -> &'static str {
        match self {
            Self::Consume => "Consume",
            Self::Acknowledge => "Acknowledge",
        }
    }
}

impl fmt::Display for FinalizeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Consume => "consume",
            Self::Acknowledge => "acknowledge",
        })
    }
}

/// Game-side shop configuration for a store product.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct ShopItem {
    pub product_id: String,
    pub consumable: bool,
}
