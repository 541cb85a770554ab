//! # Product Types
//!
//! Product catalog types for the bookshop.
//! Products are loaded from `config/products.toml` and are read-only at runtime.

use crate::error::{ShopError, ShopResult};
use serde::{Deserialize, Serialize};

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CHF,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CHF => "chf",
        }
    }

    /// Parse an ISO 4217 code, case-insensitive
    pub fn parse(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "usd" => Some(Currency::USD),
            "eur" => Some(Currency::EUR),
            "gbp" => Some(Currency::GBP),
            "jpy" => Some(Currency::JPY),
            "chf" => Some(Currency::CHF),
            _ => None,
        }
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, the others have 2)
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Convert from smallest unit back to decimal (display only)
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        let divisor = 10_f64.powi(self.decimal_places() as i32);
        amount as f64 / divisor
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::EUR
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Price with amount in smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in smallest currency unit (cents for EUR)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Price {
    /// Create a price from smallest unit (cents)
    pub fn from_cents(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self::from_cents(0, currency)
    }

    /// Price of `quantity` units at this unit price
    pub fn times(&self, quantity: u32) -> Self {
        Self {
            amount: self.amount * i64::from(quantity),
            currency: self.currency,
        }
    }

    /// Sum of two prices, or `None` when the currencies differ
    pub fn checked_add(self, rhs: Price) -> Option<Price> {
        (self.currency == rhs.currency).then(|| Price {
            amount: self.amount + rhs.amount,
            currency: self.currency,
        })
    }

    /// Get the decimal amount
    pub fn as_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount)
    }

    /// Format for display (e.g., "€10.00")
    pub fn display(&self) -> String {
        let symbol = match self.currency {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CHF => "CHF ",
        };
        if self.currency.decimal_places() == 0 {
            format!("{}{}", symbol, self.amount)
        } else {
            format!("{}{:.2}", symbol, self.as_decimal())
        }
    }
}


/// A book in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier (e.g., "dark-skies")
    pub id: String,

    /// Display title
    pub title: String,

    /// Author
    #[serde(default)]
    pub author: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Unit price for up to 50 copies
    pub price: Price,

    /// Unit price for 51 to 100 copies
    pub price_50: Price,

    /// Unit price above 100 copies
    pub price_100: Price,

    /// Whether this product is active and available for purchase
    #[serde(default = "default_true")]
    pub active: bool,

    /// Optional image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Create a product with its three volume tiers
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        price: Price,
        price_50: Price,
        price_100: Price,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: String::new(),
            description: String::new(),
            price,
            price_50,
            price_100,
            active: true,
            image_url: None,
        }
    }

    /// Create a product with the same unit price at every tier
    pub fn flat(id: impl Into<String>, title: impl Into<String>, price: Price) -> Self {
        Self::new(id, title, price, price, price)
    }
}

/// Product catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    pub products: Vec<Product>,
}

impl ProductCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    /// Add a product to the catalog
    pub fn add(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Builder: add a product
    pub fn with_product(mut self, product: Product) -> Self {
        self.add(product);
        self
    }

    /// Find a product by ID
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Get all active products
    pub fn active_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.active)
    }

    /// Check that every tier of every product is priced in `currency`
    pub fn ensure_currency(&self, currency: Currency) -> ShopResult<()> {
        for product in &self.products {
            for tier in [product.price, product.price_50, product.price_100] {
                if tier.currency != currency {
                    return Err(ShopError::Configuration(format!(
                        "Product {} is priced in {}, shop currency is {}",
                        product.id, tier.currency, currency
                    )));
                }
            }
        }
        Ok(())
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
