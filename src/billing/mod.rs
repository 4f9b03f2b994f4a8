pub mod api;
pub mod models;
pub mod service;
pub mod stripe;
pub mod sweep;
pub mod toss;

pub use models::{Subscription, PROVIDER_STRIPE, PROVIDER_TOSS};
pub use service::BillingService;
pub use stripe::StripeClient;
pub use sweep::{process_tick as run_renewal_sweep, spawn as spawn_renewal_sweep, SweepSummary};
pub use toss::TossClient;
