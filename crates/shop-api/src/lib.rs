//! # shop-api
//!
//! HTTP API layer for bookshop-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for the cart, checkout and admin order views
//! - Webhook handler for payment events
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/products` | List products |
//! | GET | `/api/v1/cart` | View cart |
//! | POST | `/api/v1/cart/lines` | Add to cart |
//! | POST | `/api/v1/cart/lines/{id}/plus` | Increment line |
//! | POST | `/api/v1/cart/lines/{id}/minus` | Decrement line |
//! | DELETE | `/api/v1/cart/lines/{id}` | Remove line |
//! | GET | `/api/v1/cart/summary` | Checkout summary |
//! | POST | `/api/v1/cart/summary` | Submit order (303) |
//! | GET | `/api/v1/orders/{id}/confirmation` | Confirm order |
//! | GET | `/api/v1/admin/orders?status=` | List orders |
//! | GET | `/api/v1/admin/orders/{id}` | Order with details |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
