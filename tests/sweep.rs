use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Extension;
use backend::billing::{run_renewal_sweep, BillingService, TossClient, PROVIDER_TOSS};
use backend::plans::Plan;
use backend::routes::api_routes;
use chrono::{DateTime, Duration, Utc};
use httpmock::prelude::*;
use sqlx::PgPool;
use tower::ServiceExt;
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

async fn seed_toss_subscription(
    pool: &PgPool,
    user_id: Uuid,
    billing_key: &str,
    status: &str,
    period_end: DateTime<Utc>,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO subscriptions (
            id, user_id, plan, provider, status,
            external_customer_id, external_subscription_id,
            current_period_start, current_period_end
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(Plan::Silver.as_str())
    .bind(PROVIDER_TOSS)
    .bind(status)
    .bind("cust_seeded")
    .bind(billing_key)
    .bind(period_end - Duration::days(30))
    .bind(period_end)
    .execute(pool)
    .await
    .unwrap();
    id
}

// key: sweep-tests -> renewal charges, batch isolation
#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn successful_charge_renews_and_advances_period(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let server = MockServer::start_async().await;
    let charge_mock = server.mock(|when, then| {
        when.method(POST).path("/v1/billing/bk_due");
        then.status(200).json_body(serde_json::json!({ "status": "DONE" }));
    });

    let user_id = Uuid::new_v4();
    seed_profile(&pool, user_id, "silver").await;
    let now = Utc::now();
    seed_toss_subscription(&pool, user_id, "bk_due", "active", now - Duration::days(1)).await;

    let toss = TossClient::new(server.base_url(), Some("test_sk".into())).unwrap();
    let summary = run_renewal_sweep(&pool, &toss, now).await.unwrap();

    charge_mock.assert();
    assert_eq!(summary.renewed, 1);
    assert_eq!(summary.total, 1);

    let service = BillingService::new(pool.clone());
    let subscription = service
        .current_billable(user_id)
        .await
        .unwrap()
        .expect("subscription present");
    assert_eq!(subscription.status, "active");
    assert!(subscription.current_period_end > now);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn same_plan_renewals_get_distinct_order_ids(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let first_user = Uuid::new_v4();
    let second_user = Uuid::new_v4();
    seed_profile(&pool, first_user, "silver").await;
    seed_profile(&pool, second_user, "silver").await;
    let now = Utc::now();
    let first_id =
        seed_toss_subscription(&pool, first_user, "bk_one", "active", now - Duration::days(2))
            .await;
    let second_id =
        seed_toss_subscription(&pool, second_user, "bk_two", "active", now - Duration::days(1))
            .await;

    // Each charge must carry its own subscription's order id; a shared id
    // would be rejected by the provider's uniqueness constraint.
    let server = MockServer::start_async().await;
    let first_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/billing/bk_one")
            .body_contains(first_id.simple().to_string());
        then.status(200).json_body(serde_json::json!({ "status": "DONE" }));
    });
    let second_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/billing/bk_two")
            .body_contains(second_id.simple().to_string());
        then.status(200).json_body(serde_json::json!({ "status": "DONE" }));
    });

    let toss = TossClient::new(server.base_url(), Some("test_sk".into())).unwrap();
    let summary = run_renewal_sweep(&pool, &toss, now).await.unwrap();

    first_mock.assert();
    second_mock.assert();
    assert_eq!(summary.renewed, 2);
    assert_eq!(summary.total, 2);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn failed_charge_marks_past_due_without_aborting_batch(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/v1/billing/bk_bad");
        then.status(502).json_body(serde_json::json!({ "code": "PAY_PROCESS_ABORTED" }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/v1/billing/bk_good");
        then.status(200).json_body(serde_json::json!({ "status": "DONE" }));
    });

    let failing_user = Uuid::new_v4();
    let healthy_user = Uuid::new_v4();
    seed_profile(&pool, failing_user, "silver").await;
    seed_profile(&pool, healthy_user, "silver").await;
    let now = Utc::now();
    seed_toss_subscription(&pool, failing_user, "bk_bad", "active", now - Duration::days(2)).await;
    seed_toss_subscription(&pool, healthy_user, "bk_good", "active", now - Duration::days(1)).await;

    let toss = TossClient::new(server.base_url(), Some("test_sk".into())).unwrap();
    let summary = run_renewal_sweep(&pool, &toss, now).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.renewed, 1);

    let failing_status: String = sqlx::query_scalar(
        "SELECT status FROM subscriptions WHERE external_subscription_id = 'bk_bad'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(failing_status, "past_due");

    let healthy_status: String = sqlx::query_scalar(
        "SELECT status FROM subscriptions WHERE external_subscription_id = 'bk_good'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(healthy_status, "active");

    // A past_due row does not change the entitlement projection.
    assert_eq!(
        sqlx::query_scalar::<_, String>("SELECT plan FROM profiles WHERE id = $1")
            .bind(failing_user)
            .fetch_one(&pool)
            .await
            .unwrap(),
        "silver"
    );
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn cancelled_and_current_rows_are_excluded(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let server = MockServer::start_async().await;
    let charge_mock = server.mock(|when, then| {
        when.method(POST).path_contains("/v1/billing/");
        then.status(200);
    });

    let user_id = Uuid::new_v4();
    seed_profile(&pool, user_id, "silver").await;
    let now = Utc::now();
    // Cancelled but overdue: must be skipped entirely.
    seed_toss_subscription(&pool, user_id, "bk_cancelled", "cancelled", now - Duration::days(3))
        .await;
    // Active but not yet due.
    seed_toss_subscription(&pool, Uuid::new_v4(), "bk_future", "active", now + Duration::days(10))
        .await;

    let toss = TossClient::new(server.base_url(), Some("test_sk".into())).unwrap();
    let summary = run_renewal_sweep(&pool, &toss, now).await.unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(summary.renewed, 0);
    charge_mock.assert_hits(0);

    let status: String = sqlx::query_scalar(
        "SELECT status FROM subscriptions WHERE external_subscription_id = 'bk_cancelled'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "cancelled");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn cron_endpoint_requires_the_shared_secret(pool: PgPool) {
    std::env::set_var("CRON_SECRET", "cron_test_secret");
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let server = MockServer::start_async().await;
    let toss = Arc::new(TossClient::new(server.base_url(), Some("test_sk".into())).unwrap());
    let app = api_routes()
        .layer(Extension(pool.clone()))
        .layer(Extension(toss));

    let request = |authorization: Option<&str>| {
        let mut builder = Request::builder()
            .method("GET")
            .uri("/api/cron/toss-billing");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    };

    let missing = app.clone().oneshot(request(None)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .clone()
        .oneshot(request(Some("Bearer not-the-secret")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let authorized = app
        .clone()
        .oneshot(request(Some("Bearer cron_test_secret")))
        .await
        .unwrap();
    assert_eq!(authorized.status(), StatusCode::OK);

    let body = hyper::body::to_bytes(authorized.into_body()).await.unwrap();
    let summary: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(summary["total"], 0);
    assert_eq!(summary["renewed"], 0);
}
