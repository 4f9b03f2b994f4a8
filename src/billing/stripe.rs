use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{extract::Extension, http::HeaderMap, Json};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::plans::Plan;

use super::models::PROVIDER_STRIPE;
use super::service::BillingService;

/// Minimal Stripe REST client. `base_url` is overridable so tests can point
/// it at a local mock server.
pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
}

impl StripeClient {
    pub fn new(base_url: impl Into<String>, secret_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build stripe client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            secret_key,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new("https://api.stripe.com", config::STRIPE_SECRET_KEY.clone())
    }

    fn secret(&self) -> Result<&str> {
        self.secret_key
            .as_deref()
            .context("STRIPE_SECRET_KEY is not configured")
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Create a hosted checkout session and return its redirect URL. No
    /// local state is written; the subscription only materializes once the
    /// webhook confirms payment.
    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        email: &str,
        plan: Plan,
        price_id: &str,
        origin: &str,
    ) -> Result<String> {
        let secret = self.secret()?;
        let params = [
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "success_url",
                format!("{origin}/pricing/success?session_id={{CHECKOUT_SESSION_ID}}"),
            ),
            ("cancel_url", format!("{origin}/pricing/cancel")),
            ("customer_email", email.to_string()),
            ("metadata[user_id]", user_id.to_string()),
            ("metadata[plan]", plan.as_str().to_string()),
        ];

        let response = self
            .client
            .post(self.endpoint("v1/checkout/sessions"))
            .basic_auth(secret, None::<&str>)
            .form(&params)
            .send()
            .await
            .context("failed to contact stripe")?
            .error_for_status()
            .context("stripe rejected the checkout session")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("failed to decode stripe response")?;
        body.get("url")
            .and_then(|value| value.as_str())
            .map(|url| url.to_string())
            .context("no url in stripe checkout session")
    }

    /// Remote cancellation. The resulting `customer.subscription.deleted`
    /// webhook performs the actual status transition.
    pub async fn cancel_subscription(&self, external_subscription_id: &str) -> Result<()> {
        let secret = self.secret()?;
        self.client
            .delete(self.endpoint(&format!("v1/subscriptions/{external_subscription_id}")))
            .basic_auth(secret, None::<&str>)
            .send()
            .await
            .context("failed to contact stripe")?
            .error_for_status()
            .context("stripe rejected the cancellation")?;
        Ok(())
    }
}

/// Verify a `Stripe-Signature: t=...,v1=...` header: HMAC-SHA256 of
/// `"{t}.{body}"` under the webhook secret.
pub fn verify_signature(secret: &str, signature_header: &str, body: &[u8]) -> bool {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }
    let Some(timestamp) = timestamp else {
        return false;
    };
    if candidates.is_empty() {
        return false;
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can use any key length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    candidates.iter().any(|candidate| *candidate == expected)
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

fn invoice_subscription_id(object: &serde_json::Value) -> Option<&str> {
    object
        .get("subscription")
        .and_then(|value| value.as_str())
        .or_else(|| {
            object
                .pointer("/parent/subscription_details/subscription")
                .and_then(|value| value.as_str())
        })
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutRequest {
    pub plan: String,
}

pub async fn stripe_checkout(
    Extension(stripe): Extension<Arc<StripeClient>>,
    AuthUser { user_id, email }: AuthUser,
    Json(payload): Json<StripeCheckoutRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let plan = Plan::from_key(&payload.plan);
    if !plan.is_paid() {
        return Err(AppError::BadRequest("Invalid plan".into()));
    }
    let Some(price_id) = config::stripe_price_id(plan) else {
        return Err(AppError::BadRequest("Invalid plan".into()));
    };

    let url = stripe
        .create_checkout_session(user_id, &email, plan, &price_id, &config::APP_BASE_URL)
        .await
        .map_err(|e| {
            error!(?e, "stripe checkout session failed");
            AppError::Message("Checkout initiation failed".into())
        })?;

    Ok(Json(json!({ "url": url })))
}

/// Signed webhook entrypoint. Nothing is trusted, and nothing mutates,
/// until the signature verifies. Verified payloads are always acknowledged,
/// even when internal handling fails, so the provider stops retrying;
/// failures are logged for operator follow-up.
pub async fn stripe_webhook(
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> AppResult<Json<serde_json::Value>> {
    let secret = config::STRIPE_WEBHOOK_SECRET
        .as_deref()
        .ok_or_else(|| AppError::Message("STRIPE_WEBHOOK_SECRET is not configured".into()))?;
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing signature".into()))?;
    if !verify_signature(secret, signature, &body) {
        return Err(AppError::BadRequest("Invalid signature".into()));
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Malformed event payload".into()))?;
    let service = BillingService::new(pool);
    let object = &event.data.object;
    let now = Utc::now();

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let user_id = object
                .pointer("/metadata/user_id")
                .and_then(|value| value.as_str())
                .and_then(|value| Uuid::parse_str(value).ok());
            let plan = object
                .pointer("/metadata/plan")
                .and_then(|value| value.as_str());
            let customer = object.get("customer").and_then(|value| value.as_str());
            let subscription = object.get("subscription").and_then(|value| value.as_str());
            if let (Some(user_id), Some(plan), Some(customer), Some(subscription)) =
                (user_id, plan, customer, subscription)
            {
                match service
                    .activate_checkout(
                        user_id,
                        Plan::from_key(plan),
                        PROVIDER_STRIPE,
                        customer,
                        subscription,
                        now,
                    )
                    .await
                {
                    Ok(()) => {
                        info!(%user_id, plan, "subscription activated via stripe checkout")
                    }
                    Err(e) => error!(?e, "failed to activate subscription from checkout event"),
                }
            } else {
                warn!("checkout.session.completed missing metadata; skipped");
            }
        }
        "invoice.paid" => {
            if let Some(subscription_id) = invoice_subscription_id(object) {
                if let Err(e) = service
                    .renew_by_external_id(PROVIDER_STRIPE, subscription_id, now)
                    .await
                {
                    error!(?e, subscription_id, "failed to renew subscription from invoice event");
                }
            }
        }
        "invoice.payment_failed" => {
            if let Some(subscription_id) = invoice_subscription_id(object) {
                if let Err(e) = service
                    .mark_past_due_by_external_id(PROVIDER_STRIPE, subscription_id)
                    .await
                {
                    error!(?e, subscription_id, "failed to mark subscription past_due");
                }
            }
        }
        "customer.subscription.deleted" => {
            if let Some(subscription_id) = object.get("id").and_then(|value| value.as_str()) {
                if let Err(e) = service
                    .cancel_by_external_id(PROVIDER_STRIPE, subscription_id, now)
                    .await
                {
                    error!(?e, subscription_id, "failed to cancel subscription from deletion event");
                }
            }
        }
        _ => {}
    }

    Ok(Json(json!({ "received": true })))
}
