//! # Order Types
//!
//! Order headers, detail lines and the builder that turns a priced cart into
//! an order draft.

use crate::account::{Account, ShippingDetails};
use crate::cart::CartItem;
use crate::error::{ShopError, ShopResult};
use crate::product::Price;
use crate::status::{OrderState, OrderStatus, PaymentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned order identifier
pub type OrderId = u64;

/// A placed order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHeader {
    pub id: OrderId,

    /// Account that placed the order
    pub account_id: String,

    pub order_date: DateTime<Utc>,

    /// Sum of detail unit prices times quantities at creation time
    pub total: Price,

    pub payment_status: PaymentStatus,

    pub order_status: OrderStatus,

    /// Hosted checkout session ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Payment intent behind the session, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,

    /// When the payment was confirmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub shipping: ShippingDetails,
}

impl OrderHeader {
    /// Materialize a draft header under a store-assigned ID
    pub fn from_draft(id: OrderId, draft: NewOrderHeader) -> Self {
        Self {
            id,
            account_id: draft.account_id,
            order_date: draft.order_date,
            total: draft.total,
            payment_status: draft.state.payment,
            order_status: draft.state.order,
            session_id: None,
            payment_intent_id: None,
            payment_date: None,
            shipping: draft.shipping,
        }
    }

    pub fn state(&self) -> OrderState {
        OrderState::new(self.payment_status, self.order_status)
    }

    /// Overwrite both statuses. Callers check `can_advance_to` first.
    pub fn set_state(&mut self, state: OrderState) {
        self.payment_status = state.payment;
        self.order_status = state.order;
    }
}

/// An order header before it has been persisted
#[derive(Debug, Clone)]
pub struct NewOrderHeader {
    pub account_id: String,
    pub order_date: DateTime<Utc>,
    pub total: Price,
    pub state: OrderState,
    pub shipping: ShippingDetails,
}

/// Immutable price/quantity snapshot of one cart line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: u64,
    pub order_id: OrderId,
    pub product_id: String,
    /// Product title at order time
    pub title: String,
    pub unit_price: Price,
    pub quantity: u32,
}

impl OrderDetail {
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// An order detail before it has been persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderDetail {
    pub product_id: String,
    pub title: String,
    pub unit_price: Price,
    pub quantity: u32,
}

impl NewOrderDetail {
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Header + detail drafts produced from a cart
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub header: NewOrderHeader,
    pub details: Vec<NewOrderDetail>,
}

impl OrderDraft {
    /// Replace the profile-derived contact fields with submitted ones
    pub fn with_shipping(mut self, shipping: ShippingDetails) -> Self {
        self.header.shipping = shipping;
        self
    }
}

/// Price every cart line and aggregate the lines into an order draft.
///
/// Shipping fields come from the account's saved profile and the initial
/// status from the account type. Nothing is persisted here.
pub fn build_order(items: &[CartItem], account: &Account) -> ShopResult<OrderDraft> {
    let first = items
        .first()
        .ok_or_else(|| ShopError::InvalidRequest("Cart is empty".to_string()))?;
    let currency = first.unit_price().currency;

    let mut total = Price::zero(currency);
    let mut details = Vec::with_capacity(items.len());

    for item in items {
        let unit_price = item.unit_price();
        if unit_price.currency != currency {
            return Err(ShopError::InvalidRequest(format!(
                "Product {} is priced in {}, cart is in {}",
                item.product.id, unit_price.currency, currency
            )));
        }

        let detail = NewOrderDetail {
            product_id: item.product.id.clone(),
            title: item.product.title.clone(),
            unit_price,
            quantity: item.line.quantity,
        };
        total = total
            .checked_add(detail.line_total())
            .ok_or_else(|| ShopError::Internal("order total currency drifted".to_string()))?;
        details.push(detail);
    }

    Ok(OrderDraft {
        header: NewOrderHeader {
            account_id: account.id.clone(),
            order_date: Utc::now(),
            total,
            state: OrderState::initial(account),
            shipping: account.profile.clone(),
        },
        details,
    })
}

/// Admin listing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    /// Payment still pending
    Pending,
    InProcess,
    /// Shipped orders
    Completed,
    Approved,
    All,
}

impl OrderFilter {
    /// Parse the `status` query value; unknown values list everything.
    pub fn parse(status: Option<&str>) -> Self {
        match status.map(|s| s.to_lowercase()).as_deref() {
            Some("pending") => OrderFilter::Pending,
            Some("inprocess") => OrderFilter::InProcess,
            Some("completed") => OrderFilter::Completed,
            Some("approved") => OrderFilter::Approved,
            _ => OrderFilter::All,
        }
    }

    pub fn matches(&self, order: &OrderHeader) -> bool {
        match self {
            OrderFilter::Pending => order.payment_status == PaymentStatus::Pending,
            OrderFilter::InProcess => order.order_status == OrderStatus::InProcess,
            OrderFilter::Completed => order.order_status == OrderStatus::Shipped,
            OrderFilter::Approved => order.order_status == OrderStatus::Approved,
            OrderFilter::All => true,
        }
    }
}

/// An order header together with its detail lines
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithDetails {
    pub header: OrderHeader,
    pub details: Vec<OrderDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartLine;
    use crate::pricing::price_for;
    use crate::product::{Currency, Product};

    fn eur(cents: i64) -> Price {
        Price::from_cents(cents, Currency::EUR)
    }

    fn item(id: u64, product: Product, quantity: u32) -> CartItem {
        CartItem::new(
            CartLine {
                id,
                account_id: "u1".into(),
                product_id: product.id.clone(),
                quantity,
            },
            product,
        )
    }

    fn profile() -> ShippingDetails {
        ShippingDetails {
            name: "Ana Horvat".into(),
            city: "Zagreb".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_retail_order() {
        let account = Account::customer("u1", profile());
        let items = vec![item(1, Product::flat("p", "P", eur(1000)), 2)];

        let draft = build_order(&items, &account).unwrap();

        assert_eq!(draft.header.total.amount, 2000);
        assert_eq!(draft.header.state, OrderState::PENDING);
        assert_eq!(draft.header.shipping.city, "Zagreb");
        assert_eq!(draft.details.len(), 1);
        assert_eq!(draft.details[0].unit_price.amount, 1000);
        assert_eq!(draft.details[0].quantity, 2);
    }

    #[test]
    fn test_company_order_is_invoiced() {
        let account = Account::company("u1", 7, profile());
        let items = vec![item(1, Product::flat("p", "P", eur(1000)), 2)];

        let draft = build_order(&items, &account).unwrap();

        assert_eq!(draft.header.state, OrderState::INVOICED);
        assert_eq!(draft.header.total.amount, 2000);
    }

    #[test]
    fn test_total_is_sum_of_tiered_lines() {
        let account = Account::customer("u1", profile());
        let products = [
            Product::new("a", "A", eur(1000), eur(800), eur(600)),
            Product::new("b", "B", eur(1550), eur(1400), eur(1250)),
            Product::flat("c", "C", eur(99)),
        ];
        let quantities = [60u32, 1, 150];

        let items: Vec<CartItem> = products
            .iter()
            .zip(quantities)
            .enumerate()
            .map(|(i, (p, q))| item(i as u64, p.clone(), q))
            .collect();

        let expected: i64 = products
            .iter()
            .zip(quantities)
            .map(|(p, q)| price_for(p, q).amount * i64::from(q))
            .sum();

        let draft = build_order(&items, &account).unwrap();
        assert_eq!(draft.header.total.amount, expected);
        assert_eq!(draft.details[0].unit_price.amount, 800);
        assert_eq!(draft.details[0].line_total().amount, 48_000);
    }

    #[test]
    fn test_empty_cart_rejected() {
        let account = Account::customer("u1", profile());
        assert!(matches!(
            build_order(&[], &account),
            Err(ShopError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_mixed_currency_rejected() {
        let account = Account::customer("u1", profile());
        let items = vec![
            item(1, Product::flat("a", "A", eur(1000)), 1),
            item(
                2,
                Product::flat("b", "B", Price::from_cents(1000, Currency::USD)),
                1,
            ),
        ];
        assert!(build_order(&items, &account).is_err());
    }

    #[test]
    fn test_submitted_shipping_replaces_profile() {
        let account = Account::customer("u1", profile());
        let items = vec![item(1, Product::flat("p", "P", eur(1000)), 1)];
        let submitted = ShippingDetails {
            name: "Gift Recipient".into(),
            ..Default::default()
        };

        let draft = build_order(&items, &account)
            .unwrap()
            .with_shipping(submitted.clone());
        assert_eq!(draft.header.shipping, submitted);
    }

    #[test]
    fn test_order_filter() {
        let mut order = OrderHeader::from_draft(
            1,
            NewOrderHeader {
                account_id: "u1".into(),
                order_date: Utc::now(),
                total: eur(0),
                state: OrderState::PENDING,
                shipping: ShippingDetails::default(),
            },
        );

        assert!(OrderFilter::parse(Some("pending")).matches(&order));
        assert!(!OrderFilter::parse(Some("approved")).matches(&order));
        assert!(OrderFilter::parse(None).matches(&order));
        assert_eq!(OrderFilter::parse(Some("bogus")), OrderFilter::All);

        order.set_state(OrderState::new(PaymentStatus::Approved, OrderStatus::Shipped));
        assert!(OrderFilter::parse(Some("completed")).matches(&order));
        assert!(!OrderFilter::parse(Some("pending")).matches(&order));

        order.set_state(OrderState::new(PaymentStatus::Approved, OrderStatus::InProcess));
        assert!(OrderFilter::parse(Some("InProcess")).matches(&order));
    }
}
