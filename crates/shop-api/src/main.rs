//! # Bookshop
//!
//! Cart, checkout and order service for a bookshop.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//!
//! # Run the server
//! bookshop
//! ```

use shop_api::{routes, state::AppState};
use shop_core::CheckoutService;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!(
        "Products loaded: {}",
        state.service.catalog().products.len()
    );
    info!("Payment provider: {}", state.service.provider_name());

    tokio::spawn(reconcile_loop(
        state.service.clone(),
        state.config.reconcile_interval,
    ));

    let app = routes::create_router(state);

    info!("Bookshop starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Cart: GET http://{}/api/v1/cart", addr);
        info!("Webhook: POST http://{}/webhook/stripe", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically settle orders whose payment webhook never arrived
async fn reconcile_loop(service: CheckoutService, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = service.reconcile_pending().await {
            warn!("Reconciliation pass failed: {}", e);
        }
    }
}

fn print_banner() {
    println!(
        r#"
  Bookshop
  ━━━━━━━━━━━━━━━━━━━━━━━
  Cart, checkout and orders
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
