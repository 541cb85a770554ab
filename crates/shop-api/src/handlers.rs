//! # Request Handlers
//!
//! Axum request handlers for the shop API.
//! Cart and checkout routes act on behalf of the account named in the
//! `x-account-id` header.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use shop_core::{
    CartLine, CartLineId, CartView, OrderConfirmation, OrderFilter, OrderId, OrderSummary,
    OrderWithDetails, ShippingDetails, ShopError, SubmitOutcome,
};
use tracing::{error, info, instrument, warn};

/// Header carrying the authenticated account id
pub const ACCOUNT_HEADER: &str = "x-account-id";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Add-to-cart request
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Admin order listing query
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn shop_error_to_response(err: ShopError) -> ApiError {
    let code = err.status_code();
    if code >= 500 {
        error!("Request failed: {}", err);
    }
    let response = ErrorResponse::new(err.to_string(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

/// The calling account, taken from the `x-account-id` header
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub String);

impl<S> FromRequestParts<S> for CurrentAccount
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACCOUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CurrentAccount(id.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new(
                        format!("Missing {} header", ACCOUNT_HEADER),
                        401,
                    )),
                )
            })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "bookshop",
        "version": env!("CARGO_PKG_VERSION"),
        "payment_provider": state.service.provider_name(),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Get products list
pub async fn list_products(State(state): State<AppState>) -> impl IntoResponse {
    let products: Vec<_> = state.service.catalog().active_products().collect();
    Json(serde_json::json!({
        "products": products,
        "count": products.len()
    }))
}

/// Priced contents of the caller's cart
pub async fn view_cart(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<CartView>, ApiError> {
    let cart = state
        .service
        .view_cart(&account)
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(cart))
}

#[instrument(skip(state, request), fields(product_id = %request.product_id))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Json(request): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartLine>), ApiError> {
    let line = state
        .service
        .add_to_cart(&account, &request.product_id, request.quantity)
        .await
        .map_err(shop_error_to_response)?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// `plus`: one more copy, then the refreshed cart
pub async fn increment_line(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(line_id): Path<CartLineId>,
) -> Result<Json<CartView>, ApiError> {
    state
        .service
        .increment_line(&account, line_id)
        .await
        .map_err(shop_error_to_response)?;
    view_cart(State(state), CurrentAccount(account)).await
}

/// `minus`: one fewer copy (removing the line at one), then the refreshed cart
pub async fn decrement_line(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(line_id): Path<CartLineId>,
) -> Result<Json<CartView>, ApiError> {
    state
        .service
        .decrement_line(&account, line_id)
        .await
        .map_err(shop_error_to_response)?;
    view_cart(State(state), CurrentAccount(account)).await
}

pub async fn remove_line(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(line_id): Path<CartLineId>,
) -> Result<Json<CartView>, ApiError> {
    state
        .service
        .remove_line(&account, line_id)
        .await
        .map_err(shop_error_to_response)?;
    view_cart(State(state), CurrentAccount(account)).await
}

/// Cart plus prefilled shipping details, shown before submitting
pub async fn order_summary(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<OrderSummary>, ApiError> {
    let summary = state
        .service
        .build_summary(&account)
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(summary))
}

/// Submit the cart as an order.
///
/// Answers `303 See Other`: to the hosted payment page for accounts that pay
/// now, or straight to the confirmation step for invoiced accounts.
#[instrument(skip(state, shipping))]
pub async fn submit_order(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Json(shipping): Json<ShippingDetails>,
) -> Result<Response, ApiError> {
    let outcome = state
        .service
        .submit_order(&account, shipping)
        .await
        .map_err(shop_error_to_response)?;

    let location = match &outcome {
        SubmitOutcome::RedirectToPayment { checkout_url, .. } => checkout_url.clone(),
        SubmitOutcome::Confirm { order_id } => state.service.urls().confirmation_url(*order_id),
    };

    info!("Order {} submitted, redirecting to {}", outcome.order_id(), location);

    Ok((
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location)],
        Json(outcome),
    )
        .into_response())
}

/// Confirmation step, also the gateway's success return URL
pub async fn order_confirmation(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderConfirmation>, ApiError> {
    let confirmation = state
        .service
        .confirm_order(order_id)
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(confirmation))
}

/// Admin: orders filtered by `?status=pending|inprocess|completed|approved`
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = OrderFilter::parse(query.status.as_deref());
    let orders = state
        .service
        .list_orders(filter)
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(serde_json::json!({ "data": orders })))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderWithDetails>, ApiError> {
    let order = state
        .service
        .order_with_details(order_id)
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(order))
}

/// Handle Stripe webhook
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing Stripe-Signature header", 400)),
            )
        })?;

    let event = state
        .gateway
        .verify_webhook(&body, signature)
        .await
        .map_err(|e| {
            error!("Webhook verification failed: {}", e);
            shop_error_to_response(e)
        })?;

    info!(
        "Received webhook: type={:?}, id={}",
        event.event_type, event.event_id
    );

    match state.service.handle_webhook_event(&event).await {
        Ok(Some(order_state)) => {
            info!("Order {:?} now {:?}", event.order_id, order_state);
            Ok(StatusCode::OK)
        }
        Ok(None) => Ok(StatusCode::OK),
        // Not ours; acknowledge so the provider stops retrying
        Err(ShopError::NotFound { entity, id }) => {
            warn!("Webhook for unknown {} {}", entity, id);
            Ok(StatusCode::OK)
        }
        Err(e) => Err(shop_error_to_response(e)),
    }
}
