use once_cell::sync::Lazy;

use crate::plans::Plan;

/// Secret used to verify identity-provider JWTs. Must be set via the
/// `JWT_SECRET` env variable.
pub static JWT_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"));

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even if database
/// migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

/// Public base URL of the frontend, used for checkout redirect targets.
pub static APP_BASE_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("APP_BASE_URL")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "http://localhost:3000".to_string())
});

/// Email granted the style-tier override. Optional.
pub static ADMIN_EMAIL: Lazy<Option<String>> = Lazy::new(|| read_optional_env("ADMIN_EMAIL"));

/// Stripe API secret key. Optional; Stripe checkout and cancellation fail until configured.
pub static STRIPE_SECRET_KEY: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("STRIPE_SECRET_KEY"));

/// Shared secret used to verify Stripe webhook signatures.
pub static STRIPE_WEBHOOK_SECRET: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("STRIPE_WEBHOOK_SECRET"));

/// Toss Payments API secret key.
pub static TOSS_SECRET_KEY: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("TOSS_SECRET_KEY"));

/// Shared secret authenticating the scheduled renewal endpoint.
pub static CRON_SECRET: Lazy<Option<String>> = Lazy::new(|| read_optional_env("CRON_SECRET"));

/// API key for the image generation service.
pub static GEMINI_API_KEY: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("GEMINI_API_KEY"));

/// key: billing-config -> renewal scan cadence
pub static BILLING_RENEWAL_SCAN_INTERVAL_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("BILLING_RENEWAL_SCAN_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(3600)
});

/// Stripe price reference for a paid plan, from `STRIPE_PRICE_ID_<PLAN>`.
pub fn stripe_price_id(plan: Plan) -> Option<String> {
    match plan {
        Plan::Free => None,
        Plan::Silver => read_optional_env("STRIPE_PRICE_ID_SILVER"),
        Plan::Gold => read_optional_env("STRIPE_PRICE_ID_GOLD"),
        Plan::Platinum => read_optional_env("STRIPE_PRICE_ID_PLATINUM"),
    }
}

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
