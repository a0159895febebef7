use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use super::ProviderError;
use crate::config::GatewaySettings;
use crate::models::Order;

type HmacSha256 = Hmac<Sha256>;

/// Inbound webhook authentication failure.
///
/// Fails closed: a missing or unconfigured secret rejects, never accepts.
/// Verification runs before any payload field is trusted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    #[error("webhook signature verification failed")]
    BadSignature,

    #[error("webhook timestamp outside the tolerance window")]
    StalePayload,
}

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: String,
}

/// Hosted checkout session handle returned by the provider. Only the id is
/// persisted (onto the order); the URL goes straight back to the buyer.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
    statement_descriptor: Option<String>,
    statement_descriptor_suffix: Option<String>,
}

impl StripeClient {
    /// Outbound calls are bounded so provider latency never wedges a request.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    /// Clock skew allowance for timestamps from the future.
    const FUTURE_SKEW_TOLERANCE_SECS: i64 = 60;

    pub fn new(settings: &GatewaySettings) -> Self {
        Self {
            client: Client::builder()
                .timeout(Self::REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            secret_key: settings.secret_key.clone(),
            webhook_secret: settings.webhook_secret.clone(),
            statement_descriptor: settings.statement_descriptor.clone(),
            statement_descriptor_suffix: settings.statement_descriptor_suffix.clone(),
        }
    }

    /// Create a hosted checkout session for an order.
    ///
    /// The line item is built ad-hoc from the order (lowercase currency,
    /// integer minor-unit amount); `metadata[order_id]` is the correlation
    /// key every later webhook carries back.
    pub async fn create_checkout_session(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, ProviderError> {
        let order_id = order.id.to_string();
        let product_name = format!("Order #{}", order.id);
        let currency = order.currency.to_lowercase();
        let unit_amount = order.total_minor.to_string();

        let mut form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("line_items[0][price_data][currency]", &currency),
            ("line_items[0][price_data][product_data][name]", &product_name),
            ("line_items[0][price_data][unit_amount]", &unit_amount),
            ("line_items[0][quantity]", "1"),
            ("metadata[order_id]", &order_id),
        ];
        if let Some(ref descriptor) = self.statement_descriptor {
            form.push(("payment_intent_data[statement_descriptor]", descriptor));
        }
        if let Some(ref suffix) = self.statement_descriptor_suffix {
            form.push(("payment_intent_data[statement_descriptor_suffix]", suffix));
        }

        let response = self
            .client
            .post("https://api.stripe.com/v1/checkout/sessions")
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(error_text));
        }

        let session: CreateCheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    /// Create a refund against the payment intent that paid an order.
    ///
    /// The caller must not flip order status from this result; the
    /// charge.refunded webhook is the single writer of terminal status.
    pub async fn create_refund(
        &self,
        payment_intent: &str,
        amount_minor: i64,
        order_id: i64,
        reason: &str,
    ) -> Result<Refund, ProviderError> {
        let amount = amount_minor.to_string();
        let order_id = order_id.to_string();

        let response = self
            .client
            .post("https://api.stripe.com/v1/refunds")
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("payment_intent", payment_intent),
                ("amount", amount.as_str()),
                ("reason", "requested_by_customer"),
                ("metadata[order_id]", order_id.as_str()),
                ("metadata[reason]", reason),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// Verify an inbound webhook payload against the shared secret.
    ///
    /// Stripe signature header format: `t=<unix ts>,v1=<hex hmac>`; the
    /// signed payload is `"{t}.{body}"` under HMAC-SHA256.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<(), VerificationError> {
        if self.webhook_secret.is_empty() {
            return Err(VerificationError::BadSignature);
        }

        let mut timestamp = None;
        let mut sig_v1 = None;
        for part in signature.split(',') {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let (Some(timestamp_str), Some(sig_v1)) = (timestamp, sig_v1) else {
            return Err(VerificationError::BadSignature);
        };

        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| VerificationError::BadSignature)?;

        // Replay protection: reject timestamps outside the tolerance window.
        let age = chrono::Utc::now().timestamp() - timestamp;
        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Err(VerificationError::StalePayload);
        }
        if age < -Self::FUTURE_SKEW_TOLERANCE_SECS {
            tracing::warn!("Stripe webhook rejected: timestamp in the future (age={}s)", age);
            return Err(VerificationError::StalePayload);
        }

        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| VerificationError::BadSignature)?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig_v1.as_bytes();

        // Length is not secret (always 64 hex chars for SHA-256), so the
        // length check can short-circuit; the content compare cannot.
        if expected_bytes.len() != provided_bytes.len() {
            return Err(VerificationError::BadSignature);
        }

        if bool::from(expected_bytes.ct_eq(provided_bytes)) {
            Ok(())
        } else {
            Err(VerificationError::BadSignature)
        }
    }
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Correlation metadata this service attaches to provider objects.
/// Stripe serializes metadata values as strings; accept numbers too.
#[derive(Debug, Default, Deserialize)]
pub struct StripeMetadata {
    #[serde(default, deserialize_with = "de_order_id")]
    pub order_id: Option<i64>,
}

fn de_order_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Int(v)) => Some(v),
        Some(Raw::Str(s)) => s.trim().parse().ok(),
    })
}

// ============ checkout.session.completed ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSessionObject {
    pub id: String,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

// ============ charge.refunded ============

#[derive(Debug, Deserialize)]
pub struct StripeCharge {
    pub id: String,
    pub amount_refunded: i64,
    #[serde(default)]
    pub metadata: StripeMetadata,
    #[serde(default)]
    pub refunds: StripeRefundList,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeRefundList {
    #[serde(default)]
    pub data: Vec<StripeRefundEntry>,
}

#[derive(Debug, Deserialize)]
pub struct StripeRefundEntry {
    pub id: String,
    pub reason: Option<String>,
}

// ============ payment_intent.payment_failed ============

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    #[serde(default)]
    pub metadata: StripeMetadata,
    pub last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentError {
    pub message: Option<String>,
}
