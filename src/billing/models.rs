use chrono::{DateTime, Months, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pub const PROVIDER_STRIPE: &str = "stripe";
pub const PROVIDER_TOSS: &str = "toss";

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_PAST_DUE: &str = "past_due";
pub const STATUS_CANCELLED: &str = "cancelled";

/// One billing relationship. Rows are never deleted; cancellation is the
/// terminal `status = 'cancelled'` state.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub provider: String,
    pub status: String,
    pub external_customer_id: String,
    pub external_subscription_id: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Billing period starting at `now`. Renewals are anchored to the renewal
/// time, not the original due time, so overdue charges drift later rather
/// than piling up.
pub fn period_from(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = now.checked_add_months(Months::new(1)).unwrap_or(now);
    (now, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn period_spans_one_month() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let (start, end) = period_from(now);
        assert_eq!(start, now);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn period_end_clamps_to_shorter_months() {
        let now = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap();
        let (_, end) = period_from(now);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).unwrap());
    }
}
