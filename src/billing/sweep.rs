use std::sync::Arc;

use anyhow::Result;
use axum::{extract::Extension, http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::time::{self, Duration as TokioDuration};
use tracing::{info, warn};

use crate::config;
use crate::error::{AppError, AppResult};
use crate::plans::Plan;

use super::models::PROVIDER_TOSS;
use super::service::BillingService;
use super::toss::{order_name, TossClient};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepSummary {
    pub renewed: usize,
    pub total: usize,
}

/// key: billing-renewal-sweep -> periodic toss billing-key charges
pub fn spawn(pool: PgPool, toss: Arc<TossClient>) {
    let interval = TokioDuration::from_secs(*config::BILLING_RENEWAL_SCAN_INTERVAL_SECS);
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        loop {
            ticker.tick().await;
            match process_tick(&pool, &toss, Utc::now()).await {
                Ok(summary) if summary.total > 0 => {
                    info!(
                        renewed = summary.renewed,
                        total = summary.total,
                        "renewal sweep completed"
                    );
                }
                Ok(_) => {}
                Err(err) => warn!(?err, "renewal sweep tick failed"),
            }
        }
    });
}

/// One sweep pass: charge every due billing key and record the outcome per
/// row. A charge failure (error response or transport fault) marks that row
/// past_due and never aborts the rest of the batch; the row stays eligible
/// for the next pass once it renews.
pub async fn process_tick(
    pool: &PgPool,
    toss: &TossClient,
    now: DateTime<Utc>,
) -> Result<SweepSummary> {
    let service = BillingService::new(pool.clone());
    let due = service.due_for_renewal(PROVIDER_TOSS, now).await?;
    let total = due.len();
    let mut renewed = 0;

    for subscription in due {
        let plan = Plan::from_key(&subscription.plan);
        // Order ids must be unique across the batch; the provider rejects
        // duplicates, so the subscription id is baked in.
        let order_id = format!(
            "renewal_{}_{}",
            now.timestamp_millis(),
            subscription.id.simple()
        );
        let charge = toss
            .charge(
                &subscription.external_subscription_id,
                &subscription.external_customer_id,
                plan.price().monthly_krw,
                &order_id,
                &order_name(plan, " (Renewal)"),
            )
            .await;

        match charge {
            Ok(()) => {
                service
                    .renew_by_external_id(
                        PROVIDER_TOSS,
                        &subscription.external_subscription_id,
                        now,
                    )
                    .await?;
                renewed += 1;
                info!(
                    subscription = %subscription.id,
                    user = %subscription.user_id,
                    "toss subscription renewed"
                );
            }
            Err(err) => {
                warn!(
                    ?err,
                    subscription = %subscription.id,
                    user = %subscription.user_id,
                    "toss renewal charge failed; marking past_due"
                );
                service
                    .mark_past_due_by_external_id(
                        PROVIDER_TOSS,
                        &subscription.external_subscription_id,
                    )
                    .await?;
            }
        }
    }

    Ok(SweepSummary { renewed, total })
}

/// Scheduler-triggered sweep endpoint, authenticated by the cron shared
/// secret.
pub async fn toss_billing_cron(
    Extension(pool): Extension<PgPool>,
    Extension(toss): Extension<Arc<TossClient>>,
    headers: HeaderMap,
) -> AppResult<Json<SweepSummary>> {
    let secret = config::CRON_SECRET
        .as_deref()
        .ok_or_else(|| AppError::Message("CRON_SECRET is not configured".into()))?;
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if provided != format!("Bearer {secret}") {
        return Err(AppError::Unauthorized);
    }

    let summary = process_tick(&pool, &toss, Utc::now())
        .await
        .map_err(|e| AppError::Message(format!("renewal sweep failed: {e}")))?;
    Ok(Json(summary))
}
