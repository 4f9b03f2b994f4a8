use axum::{extract::Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::plans::Plan;

/// Quota verdict for one user on the current UTC day. Produced by a pure
/// read; computing it never consumes quota.
#[derive(Debug, Clone, Serialize)]
pub struct UsageVerdict {
    pub allowed: bool,
    pub used: i32,
    pub limit: i32,
    pub plan: &'static str,
}

/// "Today" for the ledger, fixed to UTC so the ledger and the evaluator
/// can never disagree across a local-midnight boundary.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Current plan from the profile projection; a missing row is the free tier.
pub async fn get_user_plan(pool: &PgPool, user_id: Uuid) -> Result<Plan, sqlx::Error> {
    let plan: Option<String> = sqlx::query_scalar("SELECT plan FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(plan.as_deref().map(Plan::from_key).unwrap_or(Plan::Free))
}

pub async fn get_usage_count(
    pool: &PgPool,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<i32, sqlx::Error> {
    let count: Option<i32> =
        sqlx::query_scalar("SELECT count FROM daily_usage WHERE user_id = $1 AND date = $2")
            .bind(user_id)
            .bind(date)
            .fetch_optional(pool)
            .await?;
    Ok(count.unwrap_or(0))
}

/// Atomic per-(user, date) increment. The upsert carries the increment
/// expression so concurrent calls serialize on the row: N concurrent
/// increments always land as exactly +N.
pub async fn increment_usage(
    pool: &PgPool,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO daily_usage (user_id, date, count)
        VALUES ($1, $2, 1)
        ON CONFLICT (user_id, date)
        DO UPDATE SET count = daily_usage.count + 1, updated_at = NOW()
        RETURNING count
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_one(pool)
    .await
}

/// Admission check for a generation request. Reads plan and today's count
/// only; the ledger is untouched.
pub async fn check_usage_allowed(pool: &PgPool, user_id: Uuid) -> Result<UsageVerdict, sqlx::Error> {
    let plan = get_user_plan(pool, user_id).await?;
    let used = get_usage_count(pool, user_id, today_utc()).await?;
    let limit = plan.daily_quota();
    Ok(UsageVerdict {
        allowed: used < limit,
        used,
        limit,
        plan: plan.as_str(),
    })
}

/// Speculative verdict for the usage indicator in the UI.
pub async fn get_usage(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
) -> AppResult<Json<UsageVerdict>> {
    let verdict = check_usage_allowed(&pool, user_id).await.map_err(|e| {
        error!(?e, "DB error evaluating usage");
        AppError::Db(e)
    })?;
    Ok(Json(verdict))
}
