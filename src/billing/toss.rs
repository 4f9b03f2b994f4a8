use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Query},
    response::Redirect,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::config;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::plans::Plan;

use super::models::PROVIDER_TOSS;
use super::service::BillingService;

/// Toss Payments billing-key client. `base_url` is overridable so tests can
/// point it at a local mock server.
pub struct TossClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
}

impl TossClient {
    pub fn new(base_url: impl Into<String>, secret_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build toss client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            secret_key,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new("https://api.tosspayments.com", config::TOSS_SECRET_KEY.clone())
    }

    fn secret(&self) -> Result<&str> {
        self.secret_key
            .as_deref()
            .context("TOSS_SECRET_KEY is not configured")
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Exchange the redirect's authKey for a reusable billing key.
    pub async fn issue_billing_key(&self, auth_key: &str, customer_key: &str) -> Result<String> {
        let secret = self.secret()?;
        let response = self
            .client
            .post(self.endpoint(&format!("v1/billing/authorizations/{auth_key}")))
            .basic_auth(secret, Some(""))
            .json(&json!({ "customerKey": customer_key }))
            .send()
            .await
            .context("failed to contact toss")?
            .error_for_status()
            .context("billing key issuance failed")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("failed to decode toss response")?;
        body.get("billingKey")
            .and_then(|value| value.as_str())
            .map(|key| key.to_string())
            .context("no billingKey in toss response")
    }

    /// Charge a stored billing key. Non-2xx and transport errors both
    /// surface as `Err` so callers have a single failure path.
    pub async fn charge(
        &self,
        billing_key: &str,
        customer_key: &str,
        amount: i64,
        order_id: &str,
        order_name: &str,
    ) -> Result<()> {
        let secret = self.secret()?;
        self.client
            .post(self.endpoint(&format!("v1/billing/{billing_key}")))
            .basic_auth(secret, Some(""))
            .json(&json!({
                "customerKey": customer_key,
                "amount": amount,
                "orderId": order_id,
                "orderName": order_name,
            }))
            .send()
            .await
            .context("failed to contact toss")?
            .error_for_status()
            .context("billing charge failed")?;
        Ok(())
    }
}

fn short_key(prefix: &str, id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!("{prefix}{}", &simple[..20])
}

pub fn order_name(plan: Plan, suffix: &str) -> String {
    format!("SketchTo {} Plan{suffix}", plan.price().label)
}

#[derive(Debug, Deserialize)]
pub struct TossCheckoutRequest {
    pub plan: String,
}

/// Checkout initiation: hand the client everything its billing-auth flow
/// needs. Nothing is persisted until the callback's first charge succeeds.
pub async fn toss_checkout(
    AuthUser { user_id, .. }: AuthUser,
    Json(payload): Json<TossCheckoutRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let plan = Plan::from_key(&payload.plan);
    if !plan.is_paid() {
        return Err(AppError::BadRequest("Invalid plan".into()));
    }

    let origin = config::APP_BASE_URL.as_str();
    let customer_key = short_key("cust_", user_id);
    let order_id = short_key("order_", Uuid::new_v4());

    Ok(Json(json!({
        "customerKey": customer_key,
        "orderId": order_id,
        "orderName": order_name(plan, ""),
        "amount": plan.price().monthly_krw,
        "plan": plan.as_str(),
        "successUrl": format!("{origin}/api/payments/toss/callback?plan={}", plan.as_str()),
        "failUrl": format!("{origin}/pricing/cancel"),
    })))
}

#[derive(Debug, Deserialize)]
pub struct TossCallbackQuery {
    #[serde(rename = "authKey")]
    pub auth_key: Option<String>,
    #[serde(rename = "customerKey")]
    pub customer_key: Option<String>,
    pub plan: Option<String>,
}

/// Billing-auth redirect: issue the billing key, run the first charge, and
/// only then persist the subscription. Any failure along the way redirects
/// to the cancel page with no partial state.
pub async fn toss_callback(
    Extension(pool): Extension<PgPool>,
    Extension(toss): Extension<Arc<TossClient>>,
    AuthUser { user_id, .. }: AuthUser,
    Query(query): Query<TossCallbackQuery>,
) -> Redirect {
    let origin = config::APP_BASE_URL.as_str();
    let cancel = format!("{origin}/pricing/cancel");

    let (Some(auth_key), Some(customer_key), Some(plan_key)) =
        (query.auth_key, query.customer_key, query.plan)
    else {
        return Redirect::temporary(&cancel);
    };
    let plan = Plan::from_key(&plan_key);
    if !plan.is_paid() {
        return Redirect::temporary(&cancel);
    }

    match activate_billing_key(&pool, &toss, user_id, plan, &auth_key, &customer_key).await {
        Ok(()) => Redirect::temporary(&format!("{origin}/pricing/success")),
        Err(e) => {
            error!(?e, %user_id, "toss billing activation failed");
            Redirect::temporary(&cancel)
        }
    }
}

async fn activate_billing_key(
    pool: &PgPool,
    toss: &TossClient,
    user_id: Uuid,
    plan: Plan,
    auth_key: &str,
    customer_key: &str,
) -> Result<()> {
    let billing_key = toss.issue_billing_key(auth_key, customer_key).await?;

    let order_id = format!("sub_{}_{}", Utc::now().timestamp_millis(), plan.as_str());
    toss.charge(
        &billing_key,
        customer_key,
        plan.price().monthly_krw,
        &order_id,
        &order_name(plan, " (Monthly)"),
    )
    .await?;

    BillingService::new(pool.clone())
        .activate_checkout(
            user_id,
            plan,
            PROVIDER_TOSS,
            customer_key,
            &billing_key,
            Utc::now(),
        )
        .await?;
    info!(%user_id, plan = plan.as_str(), "subscription activated via toss billing key");
    Ok(())
}
