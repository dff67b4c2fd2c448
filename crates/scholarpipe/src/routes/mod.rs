//! HTTP route definitions and handlers.
//!
//! - [`health`] - liveness/readiness probes
//! - [`status`] - aggregate pipeline health and breaker views
//! - [`jobs`] - scrape job triggers and history

pub mod health;
pub mod jobs;
pub mod status;
