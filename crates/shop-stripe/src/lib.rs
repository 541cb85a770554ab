//! # shop-stripe
//!
//! Stripe Checkout gateway for bookshop-rs.
//!
//! `StripeCheckoutGateway` implements `shop_core::PaymentGateway` on top of
//! the Stripe Checkout Sessions API:
//! - one hosted session per order, priced in the order's currency
//! - `metadata[order_id]` links the session back to the order
//! - session lookup for confirmation and reconciliation
//! - `Stripe-Signature` verification for webhook deliveries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_stripe::StripeCheckoutGateway;
//! use shop_core::PaymentGateway;
//!
//! let gateway = StripeCheckoutGateway::from_env()?;
//! let session = gateway.create_session(&request).await?;
//!
//! // Redirect the buyer to session.checkout_url
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! let event = gateway.verify_webhook(&body, signature_header).await?;
//! service.handle_webhook_event(&event).await?;
//! ```

pub mod checkout;
pub mod config;
pub mod webhook;

// Re-exports
pub use checkout::StripeCheckoutGateway;
pub use config::StripeConfig;
pub use webhook::{parse_event, verify_signature};
