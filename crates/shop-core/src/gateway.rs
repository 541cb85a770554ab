//! # Payment Gateway Trait
//!
//! Seam between the checkout pipeline and a hosted-checkout provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PaymentGateway (trait)                     │
//! │  ├── create_session()                                       │
//! │  ├── session_status()                                       │
//! │  ├── verify_webhook()                                       │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                    ┌───────┴────────┐
//!                    │ StripeCheckout │
//!                    │    Gateway     │
//!                    └────────────────┘
//! ```

use crate::error::ShopResult;
use crate::order::{OrderDetail, OrderHeader, OrderId};
use crate::product::{Currency, Price};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One line item on a hosted checkout page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub name: String,
    /// Unit amount in minor currency units
    pub unit_amount: Price,
    pub quantity: u32,
}

/// Everything a provider needs to open a hosted checkout for an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub order_id: OrderId,
    pub currency: Currency,
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    /// Idempotency key (prevents duplicate sessions for one order)
    pub idempotency_key: String,
}

impl SessionRequest {
    /// One line item per order detail, priced at the snapshot unit price
    pub fn for_order(
        header: &OrderHeader,
        details: &[OrderDetail],
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            order_id: header.id,
            currency: header.total.currency,
            line_items: details
                .iter()
                .map(|d| SessionLineItem {
                    name: d.title.clone(),
                    unit_amount: d.unit_price,
                    quantity: d.quantity,
                })
                .collect(),
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
            idempotency_key: format!("order-{}", header.id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }
}

/// A hosted checkout session opened by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    /// URL to redirect the customer to
    pub checkout_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Snapshot of a session's payment state as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    /// Provider payment status, e.g. "paid", "unpaid"
    pub payment_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
}

impl SessionStatus {
    pub fn is_paid(&self) -> bool {
        self.payment_status.eq_ignore_ascii_case("paid")
    }
}

/// Webhook event types we care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Checkout session completed
    CheckoutCompleted,
    /// Checkout session expired without payment
    CheckoutExpired,
    /// Unknown event (passthrough)
    Unknown(String),
}

/// A verified webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider
    pub event_id: String,

    pub event_type: WebhookEventType,

    /// Provider name
    pub provider: String,

    /// Session status carried by the event (checkout events only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionStatus>,

    /// Our order ID, from session metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,

    pub timestamp: DateTime<Utc>,
}

/// Hosted-checkout payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session for an order.
    async fn create_session(&self, request: &SessionRequest) -> ShopResult<PaymentSession>;

    /// Read a session's current payment state. Has no side effects.
    async fn session_status(&self, session_id: &str) -> ShopResult<SessionStatus>;

    /// Verify a webhook signature and parse the event.
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> ShopResult<WebhookEvent>;

    /// Get the provider name (for logging and routing).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

/// Callback URLs handed to the provider
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Base URL of the shop (e.g., "https://books.example.com")
    pub base_url: String,
    /// Cart page path, where a cancelled checkout returns
    pub cart_path: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cart_path: "/api/v1/cart".to_string(),
        }
    }

    /// Confirmation step for an order
    pub fn confirmation_url(&self, order_id: OrderId) -> String {
        format!("{}/api/v1/orders/{}/confirmation", self.base_url, order_id)
    }

    pub fn cancel_url(&self) -> String {
        format!("{}{}", self.base_url, self.cart_path)
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}
