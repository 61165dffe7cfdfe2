use crate::error::{BridgeError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Micro-units per major currency unit.
pub const MICROS_PER_UNIT: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProductType {
    /// One-time purchase.
    #[default]
    #[serde(rename = "inapp")]
    OneTime,
    #[serde(rename = "subs")]
    Subscription,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "inapp",
            Self::Subscription => "subs",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price of a one-time purchase offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceOffer {
    pub price_amount_micros: i64,
    pub formatted_price: String,
    pub currency_code: String,
}

impl PriceOffer {
    /// Builds an offer from a price in major units, e.g. `0.99` USD.
    pub fn from_major_units(amount: Decimal, currency_code: &str) -> Result<Self> {
        if amount.is_sign_negative() {
            return Err(BridgeError::Catalog(format!("negative price {amount}")));
        }
        let micros = (amount * Decimal::from(MICROS_PER_UNIT))
            .trunc()
            .to_i64()
            .ok_or_else(|| BridgeError::Catalog(format!("price {amount} out of range")))?;

        Ok(Self {
            price_amount_micros: micros,
            formatted_price: format_price(amount, currency_code),
            currency_code: currency_code.to_string(),
        })
    }

    /// The price in major units.
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.price_amount_micros, 6).normalize()
    }
}

fn format_price(amount: Decimal, currency_code: &str) -> String {
    let symbol = match currency_code {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        _ => None,
    };
    match symbol {
        Some(symbol) => format!("{symbol}{:.2}", amount),
        None => format!("{:.2} {currency_code}", amount),
    }
}

/// Product metadata as returned by a catalog query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub product_type: ProductType,
    pub name: String,
    pub description: String,
    /// Present for one-time products that carry a price.
    pub offer: Option<PriceOffer>,
}

impl Product {
    pub fn new(
        product_id: impl Into<String>,
        product_type: ProductType,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_type,
            name: name.into(),
            description: description.into(),
            offer: None,
        }
    }

    pub fn with_offer(mut self, offer: PriceOffer) -> Self {
        self.offer = Some(offer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_offer_from_major_units() {
        let offer = PriceOffer::from_major_units(dec!(0.99), "USD").unwrap();
        assert_eq!(offer.price_amount_micros, 990_000);
        assert_eq!(offer.formatted_price, "$0.99");
        assert_eq!(offer.amount(), dec!(0.99));

        let offer = PriceOffer::from_major_units(dec!(4.5), "PLN").unwrap();
        assert_eq!(offer.price_amount_micros, 4_500_000);
        assert_eq!(offer.formatted_price, "4.50 PLN");
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(PriceOffer::from_major_units(dec!(-1.0), "USD").is_err());
    }

    #[test]
    fn test_product_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&ProductType::OneTime).unwrap(),
            "\"inapp\""
        );
        let parsed: ProductType = serde_json::from_str("\"subs\"").unwrap();
        assert_eq!(parsed, ProductType::Subscription);
    }
}
