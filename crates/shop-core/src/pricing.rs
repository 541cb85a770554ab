//! # Volume Pricing
//!
//! Unit price lookup by quantity. Books are cheaper in bulk:
//!
//! | Quantity | Unit price |
//! |----------|------------|
//! | 0 - 50   | `price` |
//! | 51 - 100 | `price_50` |
//! | 101+     | `price_100` |

use crate::product::{Price, Product};

/// Upper bound (inclusive) of the base price tier
pub const BASE_TIER_MAX: u32 = 50;

/// Upper bound (inclusive) of the 50+ tier
pub const TIER_50_MAX: u32 = 100;

/// Resolve the unit price of `product` when buying `quantity` copies.
pub fn price_for(product: &Product, quantity: u32) -> Price {
    if quantity <= BASE_TIER_MAX {
        product.price
    } else if quantity <= TIER_50_MAX {
        product.price_50
    } else {
        product.price_100
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Currency;

    fn book() -> Product {
        Product::new(
            "book",
            "Book",
            Price::from_cents(1000, Currency::EUR),
            Price::from_cents(800, Currency::EUR),
            Price::from_cents(600, Currency::EUR),
        )
    }

    #[test]
    fn test_tier_boundaries() {
        let book = book();
        assert_eq!(price_for(&book, 0).amount, 1000);
        assert_eq!(price_for(&book, 1).amount, 1000);
        assert_eq!(price_for(&book, 50).amount, 1000);
        assert_eq!(price_for(&book, 51).amount, 800);
        assert_eq!(price_for(&book, 100).amount, 800);
        assert_eq!(price_for(&book, 101).amount, 600);
        assert_eq!(price_for(&book, 10_000).amount, 600);
    }

    #[test]
    fn test_every_quantity_lands_in_its_tier() {
        let book = book();
        for q in 0..=250u32 {
            let expected = match q {
                0..=50 => book.price,
                51..=100 => book.price_50,
                _ => book.price_100,
            };
            assert_eq!(price_for(&book, q), expected, "quantity {}", q);
        }
    }

    #[test]
    fn test_sixty_copies_use_tier_50() {
        let book = Product::new(
            "p",
            "P",
            Price::from_cents(1000, Currency::EUR),
            Price::from_cents(800, Currency::EUR),
            Price::from_cents(500, Currency::EUR),
        );
        let unit = price_for(&book, 60);
        assert_eq!(unit.amount, 800);
        assert_eq!(unit.times(60).amount, 48_000);
    }
}
