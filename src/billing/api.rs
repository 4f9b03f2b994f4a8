use std::sync::Arc;

use axum::{extract::Extension, Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::plans::Plan;

use super::models::{Subscription, PROVIDER_STRIPE};
use super::service::BillingService;
use super::stripe::StripeClient;

#[derive(Debug, Serialize)]
pub struct PlanCatalogEntry {
    pub plan: &'static str,
    pub label: &'static str,
    pub daily_quota: i32,
    pub monthly_usd_cents: i64,
    pub monthly_krw: i64,
}

/// Public plan catalog for the pricing page.
pub async fn list_plans() -> Json<Vec<PlanCatalogEntry>> {
    let entries = Plan::ALL
        .into_iter()
        .map(|plan| {
            let price = plan.price();
            PlanCatalogEntry {
                plan: plan.as_str(),
                label: price.label,
                daily_quota: plan.daily_quota(),
                monthly_usd_cents: price.monthly_usd_cents,
                monthly_krw: price.monthly_krw,
            }
        })
        .collect();
    Json(entries)
}

pub async fn current_subscription(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
) -> AppResult<Json<Option<Subscription>>> {
    let subscription = BillingService::new(pool)
        .current_billable(user_id)
        .await
        .map_err(|e| {
            error!(?e, "DB error fetching subscription");
            AppError::Message("internal error".into())
        })?;
    Ok(Json(subscription))
}

/// User-initiated cancellation. Stripe subscriptions are cancelled remotely
/// and the webhook performs the status transition; Toss subscriptions are
/// flagged locally and the renewal sweep excludes them from then on.
pub async fn cancel_subscription(
    Extension(pool): Extension<PgPool>,
    Extension(stripe): Extension<Arc<StripeClient>>,
    AuthUser { user_id, .. }: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let service = BillingService::new(pool);
    let subscription = service.current_billable(user_id).await.map_err(|e| {
        error!(?e, "DB error fetching subscription");
        AppError::Message("internal error".into())
    })?;
    let Some(subscription) = subscription else {
        return Err(AppError::NotFound);
    };

    if subscription.provider == PROVIDER_STRIPE {
        stripe
            .cancel_subscription(&subscription.external_subscription_id)
            .await
            .map_err(|e| {
                error!(?e, subscription = %subscription.id, "stripe cancellation failed");
                AppError::Message("Cancellation failed".into())
            })?;
    } else {
        service
            .cancel_by_id(subscription.id, Utc::now())
            .await
            .map_err(|e| {
                error!(?e, subscription = %subscription.id, "local cancellation failed");
                AppError::Message("Cancellation failed".into())
            })?;
    }

    Ok(Json(json!({ "success": true })))
}
