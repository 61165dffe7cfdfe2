//! Provider-facing value types: response codes, query descriptors, flow
//! parameters and the purchase-updated event.

use super::product::{Product, ProductType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Response codes reported by the billing provider.
///
/// Numeric values follow the storefront's public billing API so that codes
/// coming from a native provider can be converted with [`ResponseCode::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCode {
    Ok,
    UserCanceled,
    ServiceUnavailable,
    BillingUnavailable,
    ItemUnavailable,
    DeveloperError,
    Error,
    ItemAlreadyOwned,
    ItemNotOwned,
    NetworkError,
    ServiceDisconnected,
    FeatureNotSupported,
}

impl ResponseCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::UserCanceled,
            2 => Self::ServiceUnavailable,
            3 => Self::BillingUnavailable,
            4 => Self::ItemUnavailable,
            5 => Self::DeveloperError,
            7 => Self::ItemAlreadyOwned,
            8 => Self::ItemNotOwned,
            12 => Self::NetworkError,
            -1 => Self::ServiceDisconnected,
            -2 => Self::FeatureNotSupported,
            _ => Self::Error,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::UserCanceled => 1,
            Self::ServiceUnavailable => 2,
            Self::BillingUnavailable => 3,
            Self::ItemUnavailable => 4,
            Self::DeveloperError => 5,
            Self::Error => 6,
            Self::ItemAlreadyOwned => 7,
            Self::ItemNotOwned => 8,
            Self::NetworkError => 12,
            Self::ServiceDisconnected => -1,
            Self::FeatureNotSupported => -2,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Outcome of a provider call: a response code plus the provider's debug message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingResult {
    pub code: ResponseCode,
    pub debug_message: String,
}

impl BillingResult {
    pub fn ok() -> Self {
        Self {
            code: ResponseCode::Ok,
            debug_message: String::new(),
        }
    }

    pub fn new(code: ResponseCode, debug_message: impl Into<String>) -> Self {
        Self {
            code,
            debug_message: debug_message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }

    /// Message to surface to the caller; falls back to the code when the
    /// provider left the debug message empty.
    pub fn diagnostic(&self) -> String {
        if self.debug_message.is_empty() {
            format!("billing response {}", self.code)
        } else {
            self.debug_message.clone()
        }
    }

    pub fn into_error(self) -> crate::error::BridgeError {
        crate::error::BridgeError::ProviderRejected {
            code: self.code,
            message: self.diagnostic(),
        }
    }
}

/// Descriptor for one product in a batched details query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub product_id: String,
    pub product_type: ProductType,
}

/// Response to a batched details query.
#[derive(Debug, Clone)]
pub struct ProductDetailsResponse {
    pub result: BillingResult,
    pub products: Vec<Product>,
}

/// Parameters for launching a purchase flow.
#[derive(Debug, Clone)]
pub struct BillingFlowParams {
    pub product: Product,
    pub offer_personalized: bool,
}

/// A purchase as reported by the provider: the original receipt JSON and its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPurchase {
    pub original_json: String,
    pub signature: String,
}

/// The provider's shared purchase-updated event. One event may carry the
/// results of several in-flight purchase flows.
#[derive(Debug, Clone)]
pub struct PurchasesUpdate {
    pub result: BillingResult,
    pub purchases: Vec<ProviderPurchase>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_code_round_trip_for_known_codes() {
        for code in [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, -1, -2] {
            assert_eq!(ResponseCode::from_code(code).code(), code);
        }
        assert_eq!(ResponseCode::from_code(42), ResponseCode::Error);
    }

    #[test]
    fn test_diagnostic_falls_back_to_code() {
        let result = BillingResult::new(ResponseCode::UserCanceled, "");
        assert_eq!(result.diagnostic(), "billing response UserCanceled(1)");

        let result = BillingResult::new(ResponseCode::Error, "Server error");
        assert_eq!(result.diagnostic(), "Server error");
    }
}
