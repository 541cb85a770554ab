//! # shop-core
//!
//! Core types and traits for the bookshop checkout pipeline.
//!
//! This crate provides:
//! - `Product`, `Price` and `ProductCatalog` for the book catalog
//! - `price_for` volume-tier pricing
//! - `CartLine` / `CartView` for shopping carts
//! - `OrderHeader`, `OrderDetail` and `build_order` for placed orders
//! - `OrderState` forward-only payment/order status machine
//! - `CartStore`, `OrderStore`, `AccountStore` and an in-memory `MemoryStore`
//! - `PaymentGateway` trait for hosted-checkout providers
//! - `CheckoutService` tying it all together
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{CheckoutService, CheckoutUrls, MemoryStore, Stores, SubmitOutcome};
//!
//! let service = CheckoutService::new(
//!     Stores::memory(Arc::new(MemoryStore::with_accounts(accounts))),
//!     Arc::new(catalog),
//!     gateway,
//!     CheckoutUrls::new("https://books.example.com"),
//! );
//!
//! service.add_to_cart("user-1", "dark-skies", 2).await?;
//! match service.submit_order("user-1", shipping).await? {
//!     SubmitOutcome::RedirectToPayment { checkout_url, .. } => { /* 303 to checkout_url */ }
//!     SubmitOutcome::Confirm { order_id } => { /* show confirmation */ }
//! }
//! ```

pub mod account;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod gateway;
pub mod order;
pub mod pricing;
pub mod product;
pub mod status;
pub mod store;

// Re-exports for convenience
pub use account::{Account, ShippingDetails};
pub use cart::{CartItem, CartLine, CartLineId, CartView, PricedLine};
pub use checkout::{
    CheckoutService, OrderConfirmation, OrderSummary, ReconcileReport, SubmitOutcome,
};
pub use error::{ShopError, ShopResult};
pub use gateway::{
    BoxedPaymentGateway, CheckoutUrls, PaymentGateway, PaymentSession, SessionLineItem,
    SessionRequest, SessionStatus, WebhookEvent, WebhookEventType,
};
pub use order::{
    build_order, NewOrderDetail, NewOrderHeader, OrderDetail, OrderDraft, OrderFilter,
    OrderHeader, OrderId, OrderWithDetails,
};
pub use pricing::price_for;
pub use product::{Currency, Price, Product, ProductCatalog};
pub use status::{OrderState, OrderStatus, PaymentStatus};
pub use store::{AccountStore, CartStore, MemoryStore, OrderStore, Stores};
