pub mod billing;
pub mod config;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod plans;
pub mod routes;
pub mod styles;
pub mod usage;
