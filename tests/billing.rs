use backend::billing::{BillingService, PROVIDER_STRIPE, PROVIDER_TOSS};
use backend::plans::Plan;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

async fn seed_profile(pool: &PgPool, user_id: Uuid, plan: &str) {
    sqlx::query("INSERT INTO profiles (id, email, plan) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(format!("{user_id}@example.com"))
        .bind(plan)
        .execute(pool)
        .await
        .unwrap();
}

async fn profile_plan(pool: &PgPool, user_id: Uuid) -> String {
    sqlx::query_scalar("SELECT plan FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

// key: billing-tests -> lifecycle state machine
#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn checkout_activation_is_idempotent(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = Uuid::new_v4();
    seed_profile(&pool, user_id, "free").await;
    let service = BillingService::new(pool.clone());
    let now = Utc::now();

    service
        .activate_checkout(user_id, Plan::Gold, PROVIDER_STRIPE, "cus_1", "sub_1", now)
        .await
        .unwrap();
    // Re-delivered webhook event
    service
        .activate_checkout(user_id, Plan::Gold, PROVIDER_STRIPE, "cus_1", "sub_1", now)
        .await
        .unwrap();

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM subscriptions WHERE provider = $1 AND external_subscription_id = $2",
    )
    .bind(PROVIDER_STRIPE)
    .bind("sub_1")
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(profile_plan(&pool, user_id).await, "gold");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn replayed_checkout_after_cancellation_does_not_regrant_plan(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = Uuid::new_v4();
    seed_profile(&pool, user_id, "free").await;
    let service = BillingService::new(pool.clone());
    let now = Utc::now();

    service
        .activate_checkout(user_id, Plan::Gold, PROVIDER_STRIPE, "cus_1", "sub_old", now)
        .await
        .unwrap();
    service
        .cancel_by_external_id(PROVIDER_STRIPE, "sub_old", now)
        .await
        .unwrap();
    assert_eq!(profile_plan(&pool, user_id).await, "free");

    // A stale re-delivered checkout event for the cancelled subscription.
    service
        .activate_checkout(user_id, Plan::Gold, PROVIDER_STRIPE, "cus_1", "sub_old", Utc::now())
        .await
        .unwrap();

    let status: String = sqlx::query_scalar(
        "SELECT status FROM subscriptions WHERE external_subscription_id = 'sub_old'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "cancelled");
    assert_eq!(profile_plan(&pool, user_id).await, "free");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn failed_renewal_keeps_entitlement(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = Uuid::new_v4();
    seed_profile(&pool, user_id, "free").await;
    let service = BillingService::new(pool.clone());
    let now = Utc::now();

    service
        .activate_checkout(user_id, Plan::Silver, PROVIDER_STRIPE, "cus_1", "sub_2", now)
        .await
        .unwrap();

    let subscription = service
        .mark_past_due_by_external_id(PROVIDER_STRIPE, "sub_2")
        .await
        .unwrap()
        .expect("subscription should transition");
    assert_eq!(subscription.status, "past_due");
    // Grace period: the plan projection is not revoked while past due.
    assert_eq!(profile_plan(&pool, user_id).await, "silver");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn past_due_recovers_on_successful_renewal(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = Uuid::new_v4();
    seed_profile(&pool, user_id, "free").await;
    let service = BillingService::new(pool.clone());
    let start = Utc::now() - Duration::days(40);

    service
        .activate_checkout(user_id, Plan::Silver, PROVIDER_TOSS, "cust_1", "bk_1", start)
        .await
        .unwrap();
    service
        .mark_past_due_by_external_id(PROVIDER_TOSS, "bk_1")
        .await
        .unwrap();

    let renewal_time = Utc::now();
    let subscription = service
        .renew_by_external_id(PROVIDER_TOSS, "bk_1", renewal_time)
        .await
        .unwrap()
        .expect("subscription should renew");

    assert_eq!(subscription.status, "active");
    assert_eq!(subscription.current_period_start, renewal_time);
    let month = subscription.current_period_end - subscription.current_period_start;
    assert!(month >= Duration::days(28) && month <= Duration::days(31));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn cancelled_is_terminal(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = Uuid::new_v4();
    seed_profile(&pool, user_id, "free").await;
    let service = BillingService::new(pool.clone());
    let now = Utc::now();

    service
        .activate_checkout(user_id, Plan::Platinum, PROVIDER_STRIPE, "cus_1", "sub_3", now)
        .await
        .unwrap();
    let cancelled = service
        .cancel_by_external_id(PROVIDER_STRIPE, "sub_3", now)
        .await
        .unwrap()
        .expect("subscription should cancel");
    assert_eq!(cancelled.status, "cancelled");
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(profile_plan(&pool, user_id).await, "free");

    // No transition is reachable from cancelled.
    assert!(service
        .renew_by_external_id(PROVIDER_STRIPE, "sub_3", Utc::now())
        .await
        .unwrap()
        .is_none());
    assert!(service
        .mark_past_due_by_external_id(PROVIDER_STRIPE, "sub_3")
        .await
        .unwrap()
        .is_none());

    let status: String = sqlx::query_scalar(
        "SELECT status FROM subscriptions WHERE external_subscription_id = 'sub_3'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "cancelled");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn current_billable_includes_past_due(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = Uuid::new_v4();
    seed_profile(&pool, user_id, "free").await;
    let service = BillingService::new(pool.clone());

    assert!(service.current_billable(user_id).await.unwrap().is_none());

    service
        .activate_checkout(user_id, Plan::Gold, PROVIDER_TOSS, "cust_1", "bk_2", Utc::now())
        .await
        .unwrap();
    service
        .mark_past_due_by_external_id(PROVIDER_TOSS, "bk_2")
        .await
        .unwrap();

    let current = service
        .current_billable(user_id)
        .await
        .unwrap()
        .expect("past_due subscription is still billable");
    assert_eq!(current.status, "past_due");
}
