//! # Cart Types
//!
//! Shopping cart lines and the priced view shown to the customer.
//! Unit prices are never stored on a cart line; they are derived from the
//! product's volume tiers every time the cart is read.

use crate::pricing::price_for;
use crate::error::{ShopError, ShopResult};
use crate::product::{Currency, Price, Product};
use serde::{Deserialize, Serialize};

/// Store-assigned cart line identifier
pub type CartLineId = u64;

/// One product + quantity entry in an account's cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub account_id: String,
    pub product_id: String,
    pub quantity: u32,
}

impl CartLine {
    /// Quantity after removing one copy, or `None` when the line should be
    /// dropped entirely.
    pub fn decremented(&self) -> Option<u32> {
        if self.quantity <= 1 {
            None
        } else {
            Some(self.quantity - 1)
        }
    }
}

/// A cart line joined with its product
#[derive(Debug, Clone)]
pub struct CartItem {
    pub line: CartLine,
    pub product: Product,
}

impl CartItem {
    pub fn new(line: CartLine, product: Product) -> Self {
        Self { line, product }
    }

    /// Unit price at the line's current quantity
    pub fn unit_price(&self) -> Price {
        price_for(&self.product, self.line.quantity)
    }

    pub fn line_total(&self) -> Price {
        self.unit_price().times(self.line.quantity)
    }
}

/// A cart line as rendered to the customer
#[derive(Debug, Clone, Serialize)]
pub struct PricedLine {
    pub line_id: CartLineId,
    pub product_id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

impl From<&CartItem> for PricedLine {
    fn from(item: &CartItem) -> Self {
        Self {
            line_id: item.line.id,
            product_id: item.product.id.clone(),
            title: item.product.title.clone(),
            quantity: item.line.quantity,
            unit_price: item.unit_price(),
            line_total: item.line_total(),
        }
    }
}

/// The priced contents of an account's cart
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<PricedLine>,
    pub total: Price,
}

impl CartView {
    /// Price the items in the shop currency.
    ///
    /// A product priced in any other currency is a catalog misconfiguration.
    pub fn from_items(items: &[CartItem], currency: Currency) -> ShopResult<Self> {
        let lines: Vec<PricedLine> = items.iter().map(PricedLine::from).collect();
        let mut total = Price::zero(currency);
        for line in &lines {
            total = total.checked_add(line.line_total).ok_or_else(|| {
                ShopError::Configuration(format!(
                    "Product {} is priced in {}, shop currency is {}",
                    line.product_id, line.line_total.currency, currency
                ))
            })?;
        }
        Ok(Self { lines, total })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
