use crate::domain::product::{PriceOffer, Product, ProductType};
use crate::domain::purchase::ShopItem;
use crate::error::{BridgeError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a store catalog: the storefront listing plus the game's shop flag.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CatalogEntry {
    pub product_id: String,
    pub product_type: Option<ProductType>,
    pub name: String,
    pub description: String,
    /// Price in major units of `currency_code`.
    pub price: Option<Decimal>,
    pub currency_code: Option<String>,
    pub consumable: Option<bool>,
}

impl CatalogEntry {
    pub fn to_product(&self) -> Result<Product> {
        let product = Product::new(
            self.product_id.clone(),
            self.product_type.unwrap_or_default(),
            self.name.clone(),
            self.description.clone(),
        );

        match (self.price, self.currency_code.as_deref()) {
            (Some(price), Some(currency)) => {
                Ok(product.with_offer(PriceOffer::from_major_units(price, currency)?))
            }
            (Some(_), None) => Err(BridgeError::Catalog(format!(
                "{} has a price but no currency code",
                self.product_id
            ))),
            (None, _) => Ok(product),
        }
    }

    /// Items default to consumable.
    pub fn shop_item(&self) -> ShopItem {
        ShopItem {
            product_id: self.product_id.clone(),
            consumable: self.consumable.unwrap_or(true),
        }
    }
}

/// Reads catalog entries from a CSV source.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn entries(self) -> impl Iterator<Item = Result<CatalogEntry>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BridgeError::from))
    }
}
