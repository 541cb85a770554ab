//! # Stripe Checkout Sessions
//!
//! Implementation of the Stripe Checkout Sessions API: creating a hosted
//! payment page for an order and reading a session's payment status back.

use crate::config::StripeConfig;
use crate::webhook;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use shop_core::{
    PaymentGateway, PaymentSession, SessionRequest, SessionStatus, ShopError, ShopResult,
    WebhookEvent,
};
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe Checkout Session gateway
///
/// Uses Stripe's hosted checkout page for payments.
pub struct StripeCheckoutGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeCheckoutGateway {
    /// Create a new Stripe checkout gateway
    pub fn new(config: StripeConfig) -> ShopResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ShopError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    /// Form fields for `POST /v1/checkout/sessions`
    fn session_form(request: &SessionRequest) -> Vec<(String, String)> {
        let mut form_params: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "metadata[order_id]".to_string(),
                request.order_id.to_string(),
            ),
            (
                "client_reference_id".to_string(),
                request.order_id.to_string(),
            ),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            form_params.push((
                format!("line_items[{}][price_data][currency]", i),
                request.currency.as_str().to_string(),
            ));
            form_params.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount.amount.to_string(),
            ));
            form_params.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            form_params.push((
                format!("line_items[{}][quantity]", i),
                item.quantity.to_string(),
            ));
        }

        form_params
    }

    /// Read a Stripe response body, mapping non-2xx statuses to provider errors
    async fn read_body(response: reqwest::Response, resource: &str) -> ShopResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::NetworkError(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        error!("Stripe API error: status={}, body={}", status, body);

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ShopError::not_found("payment session", resource));
        }

        let message = match serde_json::from_str::<StripeErrorResponse>(&body) {
            Ok(err) => err.error.message,
            Err(_) => format!("HTTP {}: {}", status, body),
        };
        Err(ShopError::ProviderError {
            provider: PROVIDER.to_string(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeCheckoutGateway {
    #[instrument(skip(self, request), fields(order_id = request.order_id))]
    async fn create_session(&self, request: &SessionRequest) -> ShopResult<PaymentSession> {
        if request.is_empty() {
            return Err(ShopError::InvalidRequest("Order has no items".to_string()));
        }

        let form_params = Self::session_form(request);
        debug!(
            "Creating Stripe checkout session: {} items",
            request.line_items.len()
        );

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form_params)
            .send()
            .await
            .map_err(|e| ShopError::NetworkError(e.to_string()))?;

        let body = Self::read_body(response, "new session").await?;
        let session: StripeCheckoutSessionResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;

        let checkout_url = session.url.ok_or_else(|| ShopError::ProviderError {
            provider: PROVIDER.to_string(),
            message: format!("Session {} has no checkout URL", session.id),
        })?;

        info!(
            "Created Stripe checkout session: id={}, url={}",
            session.id, checkout_url
        );

        Ok(PaymentSession {
            session_id: session.id,
            payment_intent_id: session.payment_intent,
            checkout_url,
            expires_at: session
                .expires_at
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        })
    }

    #[instrument(skip(self))]
    async fn session_status(&self, session_id: &str) -> ShopResult<SessionStatus> {
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.config.api_base_url, session_id
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| ShopError::NetworkError(e.to_string()))?;

        let body = Self::read_body(response, session_id).await?;
        let session: StripeCheckoutSessionResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;

        debug!(
            "Stripe session {}: payment_status={:?}",
            session.id, session.payment_status
        );

        Ok(SessionStatus {
            session_id: session.id,
            payment_status: session
                .payment_status
                .unwrap_or_else(|| "unknown".to_string()),
            payment_intent_id: session.payment_intent,
        })
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> ShopResult<WebhookEvent> {
        webhook::verify_signature(
            &self.config.webhook_secret,
            payload,
            signature,
            self.config.webhook_tolerance_secs,
            Utc::now().timestamp(),
        )?;
        webhook::parse_event(payload)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shop_core::{Currency, Price, SessionLineItem};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> SessionRequest {
        SessionRequest {
            order_id: 7,
            currency: Currency::EUR,
            line_items: vec![SessionLineItem {
                name: "Dark Skies".into(),
                unit_amount: Price::from_cents(1000, Currency::EUR),
                quantity: 2,
            }],
            success_url: "https://shop.example/api/v1/orders/7/confirmation".into(),
            cancel_url: "https://shop.example/api/v1/cart".into(),
            idempotency_key: "order-7-test".into(),
        }
    }

    fn gateway(server: &MockServer) -> StripeCheckoutGateway {
        let config = StripeConfig::new("sk_test_abc", "pk_test_xyz", "whsec_123")
            .with_api_base_url(server.uri());
        StripeCheckoutGateway::new(config).unwrap()
    }

    #[test]
    fn test_session_form() {
        let form = StripeCheckoutGateway::session_form(&request());
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("metadata[order_id]"), Some("7"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("eur"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1000"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("line_items[1][quantity]"), None);
    }

    #[tokio::test]
    async fn test_create_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("Authorization", "Bearer sk_test_abc"))
            .and(header("Idempotency-Key", "order-7-test"))
            .and(body_string_contains("unit_amount%5D=1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1",
                "payment_status": "unpaid",
                "payment_intent": null,
                "expires_at": 1_900_000_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = gateway(&server).create_session(&request()).await.unwrap();

        assert_eq!(session.session_id, "cs_test_1");
        assert_eq!(
            session.checkout_url,
            "https://checkout.stripe.com/c/pay/cs_test_1"
        );
        assert!(session.payment_intent_id.is_none());
        assert!(session.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_create_session_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid currency", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .create_session(&request())
            .await
            .unwrap_err();

        match err {
            ShopError::ProviderError { provider, message } => {
                assert_eq!(provider, "stripe");
                assert_eq!(message, "Invalid currency");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_session_rejects_empty_order() {
        let server = MockServer::start().await;
        let mut empty = request();
        empty.line_items.clear();

        assert!(matches!(
            gateway(&server).create_session(&empty).await,
            Err(ShopError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_session_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": null,
                "payment_status": "paid",
                "payment_intent": "pi_test_9"
            })))
            .mount(&server)
            .await;

        let status = gateway(&server).session_status("cs_test_1").await.unwrap();

        assert!(status.is_paid());
        assert_eq!(status.payment_intent_id.as_deref(), Some("pi_test_9"));
    }

    #[tokio::test]
    async fn test_session_status_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "message": "No such checkout.session" }
            })))
            .mount(&server)
            .await;

        assert!(matches!(
            gateway(&server).session_status("cs_missing").await,
            Err(ShopError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_verify_webhook_roundtrip() {
        let server = MockServer::start().await;
        let gateway = gateway(&server);
        let payload = serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1_700_000_000,
            "data": { "object": {
                "id": "cs_test_1",
                "object": "checkout.session",
                "payment_status": "paid",
                "metadata": { "order_id": "7" }
            }}
        }))
        .unwrap();

        let ts = Utc::now().timestamp();
        let message = format!("{}.{}", ts, String::from_utf8_lossy(&payload));
        let signature = format!(
            "t={},v1={}",
            ts,
            webhook::compute_hmac_sha256("whsec_123", &message)
        );

        let event = gateway.verify_webhook(&payload, &signature).await.unwrap();
        assert_eq!(event.order_id, Some(7));
        assert!(gateway.verify_webhook(&payload, "t=1,v1=00").await.is_err());
    }
}
