//! # Checkout Service
//!
//! Orchestrates the cart → order → payment pipeline:
//!
//! ```text
//! submit_order
//!     ├─ 1. Validate submitted shipping details
//!     ├─ 2. Price cart lines and build the order draft
//!     ├─ 3. Persist header (assigns ID), then details
//!     ├─ 4. Deferred account?  yes → redirect to confirmation
//!     ├─ 5. Create hosted checkout session
//!     ├─ 6. Persist session reference on the header
//!     └─ 7. Redirect (303) to the provider
//!
//! confirm_order
//!     ├─ 1. Load header
//!     ├─ 2. Not deferred → ask provider, advance to Approved if paid
//!     └─ 3. Clear the account's cart
//! ```

use crate::account::ShippingDetails;
use crate::cart::{CartItem, CartLine, CartLineId, CartView};
use crate::error::{ShopError, ShopResult};
use crate::gateway::{
    BoxedPaymentGateway, CheckoutUrls, SessionRequest, SessionStatus, WebhookEvent,
    WebhookEventType,
};
use crate::order::{build_order, OrderFilter, OrderHeader, OrderId, OrderWithDetails};
use crate::product::{Currency, ProductCatalog};
use crate::status::{OrderState, OrderStatus, PaymentStatus};
use crate::store::Stores;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Checkout summary shown before the order is submitted
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub cart: CartView,
    /// Prefilled from the account's saved profile
    pub shipping: ShippingDetails,
    /// Invoiced account: no payment at checkout
    pub deferred_payment: bool,
}

/// What the caller should do after a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Send the customer to the hosted checkout (HTTP 303)
    RedirectToPayment {
        order_id: OrderId,
        checkout_url: String,
    },
    /// Invoiced order: go straight to the confirmation step
    Confirm { order_id: OrderId },
}

impl SubmitOutcome {
    pub fn order_id(&self) -> OrderId {
        match self {
            SubmitOutcome::RedirectToPayment { order_id, .. } => *order_id,
            SubmitOutcome::Confirm { order_id } => *order_id,
        }
    }
}

/// Result of the confirmation step
#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    /// Cart lines removed for the order's account
    pub cart_lines_cleared: usize,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Pending orders with a session that were checked
    pub checked: usize,
    /// Orders moved to Approved during this pass
    pub approved: usize,
}

/// Cart, checkout and order operations
#[derive(Clone)]
pub struct CheckoutService {
    stores: Stores,
    catalog: Arc<ProductCatalog>,
    gateway: BoxedPaymentGateway,
    urls: CheckoutUrls,
    currency: Currency,
}

impl CheckoutService {
    pub fn new(
        stores: Stores,
        catalog: Arc<ProductCatalog>,
        gateway: BoxedPaymentGateway,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            stores,
            catalog,
            gateway,
            urls,
            currency: Currency::default(),
        }
    }

    /// Builder: set the shop currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn urls(&self) -> &CheckoutUrls {
        &self.urls
    }

    pub fn provider_name(&self) -> &'static str {
        self.gateway.provider_name()
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Join an account's cart lines with their products
    async fn cart_items(&self, account_id: &str) -> ShopResult<Vec<CartItem>> {
        let lines = self.stores.carts.lines_for(account_id).await?;
        lines
            .into_iter()
            .map(|line| {
                let product = self
                    .catalog
                    .get(&line.product_id)
                    .cloned()
                    .ok_or_else(|| ShopError::not_found("product", &line.product_id))?;
                Ok(CartItem::new(line, product))
            })
            .collect()
    }

    /// Load a cart line, hiding lines owned by other accounts
    async fn owned_line(&self, account_id: &str, line_id: CartLineId) -> ShopResult<CartLine> {
        let line = self.stores.carts.get_line(line_id).await?;
        if line.account_id != account_id {
            return Err(ShopError::not_found("cart line", line_id));
        }
        Ok(line)
    }

    /// Priced contents of an account's cart
    #[instrument(skip(self))]
    pub async fn view_cart(&self, account_id: &str) -> ShopResult<CartView> {
        let items = self.cart_items(account_id).await?;
        CartView::from_items(&items, self.currency)
    }

    #[instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        account_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> ShopResult<CartLine> {
        if quantity == 0 {
            return Err(ShopError::InvalidRequest(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let product = self
            .catalog
            .get(product_id)
            .ok_or_else(|| ShopError::not_found("product", product_id))?;
        if !product.active {
            return Err(ShopError::InvalidRequest(format!(
                "Product is not available: {}",
                product_id
            )));
        }

        let line = self
            .stores
            .carts
            .add(account_id, product_id, quantity)
            .await?;
        debug!("Cart line {} now holds {} x {}", line.id, line.quantity, product_id);
        Ok(line)
    }

    /// Add one copy to a cart line
    #[instrument(skip(self))]
    pub async fn increment_line(&self, account_id: &str, line_id: CartLineId) -> ShopResult<CartLine> {
        let line = self.owned_line(account_id, line_id).await?;
        self.stores
            .carts
            .set_quantity(line_id, line.quantity.saturating_add(1))
            .await
    }

    /// Remove one copy from a cart line; the last copy removes the line.
    ///
    /// Returns the updated line, or `None` when the line was deleted.
    #[instrument(skip(self))]
    pub async fn decrement_line(
        &self,
        account_id: &str,
        line_id: CartLineId,
    ) -> ShopResult<Option<CartLine>> {
        let line = self.owned_line(account_id, line_id).await?;
        match line.decremented() {
            Some(quantity) => Ok(Some(
                self.stores.carts.set_quantity(line_id, quantity).await?,
            )),
            None => {
                self.stores.carts.remove(line_id).await?;
                debug!("Removed cart line {} at last copy", line_id);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn remove_line(&self, account_id: &str, line_id: CartLineId) -> ShopResult<()> {
        self.owned_line(account_id, line_id).await?;
        self.stores.carts.remove(line_id).await
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Priced cart plus shipping details prefilled from the account profile
    #[instrument(skip(self))]
    pub async fn build_summary(&self, account_id: &str) -> ShopResult<OrderSummary> {
        let account = self.stores.accounts.get(account_id).await?;
        let items = self.cart_items(account_id).await?;

        Ok(OrderSummary {
            cart: CartView::from_items(&items, self.currency)?,
            shipping: account.profile.clone(),
            deferred_payment: account.is_deferred(),
        })
    }

    /// Turn the account's cart into an order and, for accounts that pay at
    /// checkout, open a hosted payment session.
    ///
    /// The cart is left untouched; it is cleared at the confirmation step.
    #[instrument(skip(self, shipping))]
    pub async fn submit_order(
        &self,
        account_id: &str,
        shipping: ShippingDetails,
    ) -> ShopResult<SubmitOutcome> {
        shipping.validate()?;

        let account = self.stores.accounts.get(account_id).await?;
        let items = self.cart_items(account_id).await?;
        CartView::from_items(&items, self.currency)?;
        let draft = build_order(&items, &account)?.with_shipping(shipping);

        let header = self.stores.orders.insert_header(draft.header).await?;
        let details = self
            .stores
            .orders
            .insert_details(header.id, draft.details)
            .await?;

        info!(
            "Created order {}: {} lines, total={}, payment={}",
            header.id,
            details.len(),
            header.total.display(),
            header.payment_status.as_str()
        );

        if account.is_deferred() {
            return Ok(SubmitOutcome::Confirm {
                order_id: header.id,
            });
        }

        let request = SessionRequest::for_order(
            &header,
            &details,
            self.urls.confirmation_url(header.id),
            self.urls.cancel_url(),
        );

        let session = match self.gateway.create_session(&request).await {
            Ok(session) => session,
            Err(e) => {
                error!("Payment session for order {} failed: {}", header.id, e);
                self.abandon_order(&header).await;
                return Err(e);
            }
        };

        self.stores
            .orders
            .set_payment_refs(
                header.id,
                &session.session_id,
                session.payment_intent_id.as_deref(),
            )
            .await?;

        info!(
            "Order {} awaiting payment in session {}",
            header.id, session.session_id
        );

        Ok(SubmitOutcome::RedirectToPayment {
            order_id: header.id,
            checkout_url: session.checkout_url,
        })
    }

    /// Compensate for a session that could not be created
    async fn abandon_order(&self, header: &OrderHeader) {
        let current = header.state();
        let Some(next) = current.on_session_failed() else {
            return;
        };

        match self.stores.orders.transition(header.id, current, next).await {
            Ok((state, _)) => warn!(
                "Order {} marked {}/{}",
                header.id,
                state.payment.as_str(),
                state.order.as_str()
            ),
            Err(e) => error!("Could not cancel order {}: {}", header.id, e),
        }
    }

    /// Confirmation step: settle the payment status, then clear the cart.
    ///
    /// The cart is cleared whether or not the payment was confirmed.
    #[instrument(skip(self))]
    pub async fn confirm_order(&self, order_id: OrderId) -> ShopResult<OrderConfirmation> {
        let header = self.stores.orders.get(order_id).await?;

        let state = if header.payment_status != PaymentStatus::Delayed {
            self.refresh_payment(&header).await?
        } else {
            header.state()
        };

        let cleared = self.stores.carts.clear(&header.account_id).await?;
        debug!(
            "Cleared {} cart lines for account {}",
            cleared, header.account_id
        );

        Ok(OrderConfirmation {
            order_id,
            payment_status: state.payment,
            order_status: state.order,
            cart_lines_cleared: cleared,
        })
    }

    /// Ask the provider about an order's session and advance it if paid.
    ///
    /// A missing session or a failed lookup counts as "not paid yet".
    async fn refresh_payment(&self, header: &OrderHeader) -> ShopResult<OrderState> {
        let current = header.state();
        if !current.awaits_payment() {
            return Ok(current);
        }

        let Some(session_id) = header.session_id.as_deref() else {
            warn!("Order {} has no payment session, treating as unpaid", header.id);
            return Ok(current);
        };

        match self.gateway.session_status(session_id).await {
            Ok(status) => self.apply_session_status(header.id, current, &status).await,
            Err(e) if e.is_retryable() => {
                warn!(
                    "Session lookup for order {} failed, treating as unpaid: {}",
                    header.id, e
                );
                Ok(current)
            }
            Err(e) => {
                error!(
                    "Session lookup for order {} rejected, treating as unpaid: {}",
                    header.id, e
                );
                Ok(current)
            }
        }
    }

    async fn apply_session_status(
        &self,
        order_id: OrderId,
        current: OrderState,
        status: &SessionStatus,
    ) -> ShopResult<OrderState> {
        if !status.is_paid() {
            debug!(
                "Session {} for order {} is {}",
                status.session_id, order_id, status.payment_status
            );
            return Ok(current);
        }

        let Some(next) = current.on_payment_confirmed() else {
            return Ok(current);
        };

        self.stores
            .orders
            .set_payment_refs(
                order_id,
                &status.session_id,
                status.payment_intent_id.as_deref(),
            )
            .await?;

        let (state, changed) = self
            .stores
            .orders
            .transition(order_id, current, next)
            .await?;
        if changed {
            info!("Order {} payment approved", order_id);
        }
        Ok(state)
    }

    /// Check every pending order that has a session and approve paid ones
    #[instrument(skip(self))]
    pub async fn reconcile_pending(&self) -> ShopResult<ReconcileReport> {
        let pending: Vec<OrderHeader> = self
            .stores
            .orders
            .list()
            .await?
            .into_iter()
            .filter(|o| o.state().awaits_payment() && o.session_id.is_some())
            .collect();

        let mut report = ReconcileReport::default();
        for header in &pending {
            report.checked += 1;
            match self.refresh_payment(header).await {
                Ok(state) if state != header.state() => report.approved += 1,
                Ok(_) => {}
                Err(e) if e.is_retryable() => {
                    warn!("Reconciling order {} failed, retrying next pass: {}", header.id, e)
                }
                Err(e) => error!("Reconciling order {} failed: {}", header.id, e),
            }
        }

        if report.checked > 0 {
            info!(
                "Reconciled {} pending orders, {} approved",
                report.checked, report.approved
            );
        }
        Ok(report)
    }

    /// Apply a verified provider webhook. Returns the order's resulting state
    /// when the event concerned one of our orders.
    #[instrument(skip(self, event), fields(event_id = %event.event_id))]
    pub async fn handle_webhook_event(&self, event: &WebhookEvent) -> ShopResult<Option<OrderState>> {
        match &event.event_type {
            WebhookEventType::CheckoutCompleted => {
                let (Some(order_id), Some(status)) = (event.order_id, event.session.as_ref())
                else {
                    warn!("Checkout event without order reference, ignoring");
                    return Ok(None);
                };

                let header = self.stores.orders.get(order_id).await?;
                if let Some(known) = header.session_id.as_deref() {
                    if known != status.session_id {
                        warn!(
                            "Session {} does not belong to order {} (expected {}), ignoring",
                            status.session_id, order_id, known
                        );
                        return Ok(None);
                    }
                }

                let state = self
                    .apply_session_status(order_id, header.state(), status)
                    .await?;
                Ok(Some(state))
            }
            WebhookEventType::CheckoutExpired => {
                info!("Checkout session expired for order {:?}", event.order_id);
                Ok(None)
            }
            WebhookEventType::Unknown(kind) => {
                debug!("Unhandled webhook event: {}", kind);
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Orders matching an admin filter, oldest first
    pub async fn list_orders(&self, filter: OrderFilter) -> ShopResult<Vec<OrderHeader>> {
        let orders = self.stores.orders.list().await?;
        Ok(orders.into_iter().filter(|o| filter.matches(o)).collect())
    }

    pub async fn order_with_details(&self, order_id: OrderId) -> ShopResult<OrderWithDetails> {
        let header = self.stores.orders.get(order_id).await?;
        let details = self.stores.orders.details(order_id).await?;
        Ok(OrderWithDetails { header, details })
    }
}
