use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::plans::Plan;

use super::models::{period_from, Subscription, STATUS_ACTIVE, STATUS_CANCELLED, STATUS_PAST_DUE};

/// key: billing-service -> subscription lifecycle
///
/// The single writer for `subscriptions` rows and the `profiles.plan`
/// projection. Every update guards `status <> 'cancelled'` so the terminal
/// state has no exits.
#[derive(Clone)]
pub struct BillingService {
    pool: PgPool,
}

impl BillingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Checkout completion from either provider. Idempotent: the insert is
    /// keyed on (provider, external_subscription_id), so a re-delivered
    /// event cannot double-create the row. The plan projection only follows
    /// when the row landed or still lives; a replay against a cancelled
    /// subscription must not re-grant the plan.
    pub async fn activate_checkout(
        &self,
        user_id: Uuid,
        plan: Plan,
        provider: &str,
        external_customer_id: &str,
        external_subscription_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let (period_start, period_end) = period_from(now);
        let inserted = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, plan, provider, status,
                external_customer_id, external_subscription_id,
                current_period_start, current_period_end
            ) VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $8)
            ON CONFLICT (provider, external_subscription_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(plan.as_str())
        .bind(provider)
        .bind(external_customer_id)
        .bind(external_subscription_id)
        .bind(period_start)
        .bind(period_end)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            let status: Option<String> = sqlx::query_scalar(
                "SELECT status FROM subscriptions WHERE provider = $1 AND external_subscription_id = $2",
            )
            .bind(provider)
            .bind(external_subscription_id)
            .fetch_optional(&self.pool)
            .await?;
            if status.as_deref() == Some(STATUS_CANCELLED) {
                return Ok(());
            }
        }

        self.set_profile_plan(user_id, plan).await?;
        Ok(())
    }

    /// Successful renewal charge: (re)activate and advance the period one
    /// month from the renewal time. Also the past_due -> active path.
    pub async fn renew_by_external_id(
        &self,
        provider: &str,
        external_subscription_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>> {
        let (period_start, period_end) = period_from(now);
        let row = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = $1,
                current_period_start = $2,
                current_period_end = $3,
                updated_at = NOW()
            WHERE provider = $4
              AND external_subscription_id = $5
              AND status <> $6
            RETURNING *
            "#,
        )
        .bind(STATUS_ACTIVE)
        .bind(period_start)
        .bind(period_end)
        .bind(provider)
        .bind(external_subscription_id)
        .bind(STATUS_CANCELLED)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Failed renewal charge. Entitlement is not revoked while past due;
    /// the profile plan is left alone.
    pub async fn mark_past_due_by_external_id(
        &self,
        provider: &str,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = $1, updated_at = NOW()
            WHERE provider = $2
              AND external_subscription_id = $3
              AND status <> $4
            RETURNING *
            "#,
        )
        .bind(STATUS_PAST_DUE)
        .bind(provider)
        .bind(external_subscription_id)
        .bind(STATUS_CANCELLED)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn cancel_by_external_id(
        &self,
        provider: &str,
        external_subscription_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = $1, cancelled_at = $2, updated_at = NOW()
            WHERE provider = $3
              AND external_subscription_id = $4
              AND status <> $1
            RETURNING *
            "#,
        )
        .bind(STATUS_CANCELLED)
        .bind(now)
        .bind(provider)
        .bind(external_subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(subscription) = &row {
            self.set_profile_plan(subscription.user_id, Plan::Free)
                .await?;
        }
        Ok(row)
    }

    /// Local cancellation for providers without a remote cancel primitive;
    /// the renewal sweep excludes the row from then on.
    pub async fn cancel_by_id(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = $1, cancelled_at = $2, updated_at = NOW()
            WHERE id = $3 AND status <> $1
            RETURNING *
            "#,
        )
        .bind(STATUS_CANCELLED)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(subscription) = &row {
            self.set_profile_plan(subscription.user_id, Plan::Free)
                .await?;
        }
        Ok(row)
    }

    /// The user's current billable subscription, if any. Past due still
    /// counts: a grace-period subscription can be cancelled.
    pub async fn current_billable(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE user_id = $1 AND status IN ($2, $3)
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(STATUS_ACTIVE)
        .bind(STATUS_PAST_DUE)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Active subscriptions of one provider whose period has lapsed. The
    /// `status = 'active'` filter is what keeps cancelled and past_due rows
    /// out of the sweep.
    pub async fn due_for_renewal(
        &self,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE provider = $1
              AND status = $2
              AND current_period_end <= $3
            ORDER BY current_period_end ASC
            "#,
        )
        .bind(provider)
        .bind(STATUS_ACTIVE)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn set_profile_plan(&self, user_id: Uuid, plan: Plan) -> Result<()> {
        sqlx::query("UPDATE profiles SET plan = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(plan.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
