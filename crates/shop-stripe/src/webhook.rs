//! # Stripe Webhook Handling
//!
//! Signature verification and parsing of Stripe webhook deliveries.
//! Only checkout session events carry anything the order pipeline acts on.

use chrono::{DateTime, Utc};
use shop_core::{OrderId, SessionStatus, ShopError, ShopResult, WebhookEvent, WebhookEventType};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

/// Verify the `Stripe-Signature` header against the raw payload.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature: &str,
    tolerance_secs: i64,
    now: i64,
) -> ShopResult<()> {
    let sig_parts = parse_signature_header(signature)?;

    if (now - sig_parts.timestamp).abs() > tolerance_secs {
        return Err(ShopError::WebhookVerificationFailed(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let signed_payload = format!(
        "{}.{}",
        sig_parts.timestamp,
        String::from_utf8_lossy(payload)
    );
    let expected_sig = compute_hmac_sha256(secret, &signed_payload);

    let valid = sig_parts
        .signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected_sig));

    if !valid {
        return Err(ShopError::WebhookVerificationFailed(
            "Signature mismatch".to_string(),
        ));
    }
    Ok(())
}

/// Parse a verified payload into a provider-neutral event
pub fn parse_event(payload: &[u8]) -> ShopResult<WebhookEvent> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
        ShopError::WebhookParseError(format!("Failed to parse webhook: {}", e))
    })?;

    debug!("Parsing Stripe webhook: type={}", event.event_type);

    let event_type = match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            WebhookEventType::CheckoutCompleted
        }
        "checkout.session.expired" => WebhookEventType::CheckoutExpired,
        other => WebhookEventType::Unknown(other.to_string()),
    };

    let obj = &event.data.object;
    let is_session = obj.get("object").and_then(|v| v.as_str()) == Some("checkout.session");

    let session = if is_session {
        let session_id = obj
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ShopError::WebhookParseError("Missing session id".to_string()))?;

        Some(SessionStatus {
            session_id: session_id.to_string(),
            payment_status: obj
                .get("payment_status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            payment_intent_id: obj
                .get("payment_intent")
                .and_then(|v| v.as_str())
                .map(String::from),
        })
    } else {
        None
    };

    let order_id = obj
        .get("metadata")
        .and_then(|m| m.get("order_id"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<OrderId>().ok());

    Ok(WebhookEvent {
        event_id: event.id,
        event_type,
        provider: "stripe".to_string(),
        session,
        order_id,
        timestamp: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
    })
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> ShopResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        ShopError::WebhookVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(ShopError::WebhookVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

pub(crate) fn compute_hmac_sha256(secret: &str, message: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
