use axum::{
    routing::{get, post},
    Router,
};

use crate::{billing, generation, usage};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/generate", post(generation::generate))
        .route("/api/usage", get(usage::get_usage))
        .route("/api/styles", get(generation::list_styles))
        .route("/api/plans", get(billing::api::list_plans))
        .route(
            "/api/payments/stripe/checkout",
            post(billing::stripe::stripe_checkout),
        )
        .route(
            "/api/payments/stripe/webhook",
            post(billing::stripe::stripe_webhook),
        )
        .route(
            "/api/payments/toss/checkout",
            post(billing::toss::toss_checkout),
        )
        .route(
            "/api/payments/toss/callback",
            get(billing::toss::toss_callback),
        )
        .route("/api/cron/toss-billing", get(billing::sweep::toss_billing_cron))
        .route(
            "/api/subscriptions/cancel",
            post(billing::api::cancel_subscription),
        )
        .route(
            "/api/subscriptions/current",
            get(billing::api::current_subscription),
        )
}
