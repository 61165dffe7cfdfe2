//! JSON records exchanged with the engine's scripting layer.
//!
//! Field names of [`ProductRecord`] are fixed by the engine-side decoder and
//! keep their historical spelling (`ProducID`, `ProducType`).

use crate::domain::product::Product;
use crate::domain::purchase::{FINALIZE_TYPE_KEY, FinalizeKind, Receipt};
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(rename = "ProducID")]
    pub product_id: String,
    #[serde(rename = "ProducType")]
    pub product_type: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description")]
    pub description: String,
    /// Price in micro-units of the currency.
    #[serde(rename = "Price", default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(rename = "FormattedPrice", default, skip_serializing_if = "Option::is_none")]
    pub formatted_price: Option<String>,
    #[serde(rename = "CurrencyCode", default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
}

impl TryFrom<&Product> for ProductRecord {
    type Error = BridgeError;

    fn try_from(product: &Product) -> Result<Self> {
        let fail = |reason: &str| BridgeError::Serialization {
            product_id: product.product_id.clone(),
            reason: reason.to_string(),
        };

        if product.product_id.trim().is_empty() {
            return Err(fail("empty product identifier"));
        }

        let mut record = Self {
            product_id: product.product_id.clone(),
            product_type: product.product_type.as_str().to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: None,
            formatted_price: None,
            currency_code: None,
        };

        if let Some(offer) = &product.offer {
            if !is_currency_code(&offer.currency_code) {
                return Err(fail("currency code is not an ISO 4217 code"));
            }
            if offer.price_amount_micros < 0 {
                return Err(fail("negative price"));
            }
            record.price = Some(offer.price_amount_micros);
            record.formatted_price = Some(offer.formatted_price.clone());
            record.currency_code = Some(offer.currency_code.clone());
        }

        Ok(record)
    }
}

fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

impl ProductRecord {
    pub fn encode(product: &Product) -> Result<String> {
        let record = Self::try_from(product)?;
        Ok(serde_json::to_string(&record)?)
    }

    pub fn decode(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Purchase details handed to game code once a receipt has been decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInfo {
    pub product_id: String,
    pub token: String,
    pub signature: String,
    pub order_id: String,
    pub details: BTreeMap<String, String>,
}

impl PurchaseInfo {
    pub fn from_receipt(receipt: &str, signature: &str) -> Result<Self> {
        let receipt = Receipt::parse(receipt)?;

        let mut details = BTreeMap::new();
        details.insert("PurchaseTime".to_string(), receipt.purchase_time.to_string());
        details.insert("Quantity".to_string(), receipt.quantity.to_string());
        details.insert(
            "PurchaseState".to_string(),
            receipt.purchase_state.to_string(),
        );
        details.insert(
            "Acknowledged".to_string(),
            if receipt.acknowledged { "True" } else { "False" }.to_string(),
        );

        Ok(Self {
            product_id: receipt.product_id,
            token: receipt.purchase_token,
            signature: signature.to_string(),
            order_id: receipt.order_id.unwrap_or_default(),
            details,
        })
    }

    /// Records how this purchase should be finalized.
    pub fn set_finalize_kind(&mut self, kind: FinalizeKind) {
        self.details.insert(
            FINALIZE_TYPE_KEY.to_string(),
            kind.custom_data_value().to_string(),
        );
    }

    pub fn finalize_kind(&self) -> Option<FinalizeKind> {
        FinalizeKind::from_custom_data(&self.details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{PriceOffer, ProductType};

    fn coin() -> Product {
        Product::new("coin_100", ProductType::OneTime, "100 Coins", "A pile of coins").with_offer(
            PriceOffer {
                price_amount_micros: 99_000_000,
                formatted_price: "$0.99".into(),
                currency_code: "USD".into(),
            },
        )
    }

    #[test]
    fn test_record_field_names() {
        let json = ProductRecord::encode(&coin()).unwrap();
        assert_eq!(
            json,
            r#"{"ProducID":"coin_100","ProducType":"inapp","Name":"100 Coins","Description":"A pile of coins","Price":99000000,"FormattedPrice":"$0.99","CurrencyCode":"USD"}"#
        );
    }

    #[test]
    fn test_record_without_offer_omits_price_fields() {
        let product = Product::new("vip", ProductType::Subscription, "VIP", "Monthly");
        let json = ProductRecord::encode(&product).unwrap();
        assert!(!json.contains("Price"));
        assert!(!json.contains("CurrencyCode"));

        let decoded = ProductRecord::decode(&json).unwrap();
        assert_eq!(decoded.product_type, "subs");
        assert_eq!(decoded.price, None);
    }

    #[test]
    fn test_invalid_currency_fails_conversion() {
        let mut product = coin();
        if let Some(offer) = product.offer.as_mut() {
            offer.currency_code = "dollars".into();
        }
        let err = ProductRecord::encode(&product).unwrap_err();
        assert!(matches!(err, BridgeError::Serialization { .. }));
    }

    #[test]
    fn test_purchase_info_from_receipt() {
        let receipt = r#"{"orderId":"GPA.1","packageName":"p","productId":"coin_100","purchaseTime":1665439535789,"purchaseState":0,"purchaseToken":"tok","quantity":2,"acknowledged":true}"#;
        let mut info = PurchaseInfo::from_receipt(receipt, "sig").unwrap();

        assert_eq!(info.product_id, "coin_100");
        assert_eq!(info.token, "tok");
        assert_eq!(info.order_id, "GPA.1");
        assert_eq!(info.details["PurchaseTime"], "1665439535789");
        assert_eq!(info.details["Quantity"], "2");
        assert_eq!(info.details["Acknowledged"], "True");

        assert_eq!(info.finalize_kind(), None);
        info.set_finalize_kind(FinalizeKind::Acknowledge);
        assert_eq!(info.finalize_kind(), Some(FinalizeKind::Acknowledge));
    }
}
