//! # Routes
//!
//! Axum router configuration for the shop API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Catalog:
///   - GET  /api/v1/products - List active products
///
/// - Cart (caller identified by `x-account-id`):
///   - GET    /api/v1/cart - View cart
///   - POST   /api/v1/cart/lines - Add a product
///   - POST   /api/v1/cart/lines/{line_id}/plus - One more copy
///   - POST   /api/v1/cart/lines/{line_id}/minus - One fewer copy
///   - DELETE /api/v1/cart/lines/{line_id} - Remove a line
///   - GET    /api/v1/cart/summary - Checkout summary
///   - POST   /api/v1/cart/summary - Submit order (303)
///
/// - Orders:
///   - GET /api/v1/orders/{order_id}/confirmation - Confirmation step
///   - GET /api/v1/admin/orders?status= - Filtered order list
///   - GET /api/v1/admin/orders/{order_id} - Order with detail lines
///
/// - Webhooks:
///   - POST /webhook/stripe - Stripe webhook handler
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let cart_routes = Router::new()
        .route("/cart", get(handlers::view_cart))
        .route("/cart/lines", post(handlers::add_to_cart))
        .route("/cart/lines/{line_id}", delete(handlers::remove_line))
        .route("/cart/lines/{line_id}/plus", post(handlers::increment_line))
        .route("/cart/lines/{line_id}/minus", post(handlers::decrement_line))
        .route(
            "/cart/summary",
            get(handlers::order_summary).post(handlers::submit_order),
        );

    let order_routes = Router::new()
        .route("/orders/{order_id}/confirmation", get(handlers::order_confirmation))
        .route("/admin/orders", get(handlers::list_orders))
        .route("/admin/orders/{order_id}", get(handlers::get_order));

    let api_routes = Router::new()
        .route("/products", get(handlers::list_products))
        .merge(cart_routes)
        .merge(order_routes);

    // Webhook routes (must accept raw body)
    let webhook_routes = Router::new().route("/stripe", post(handlers::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
