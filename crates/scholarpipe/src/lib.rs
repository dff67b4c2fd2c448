//! # Scholarpipe
//!
//! A scheduled, concurrent scholarship acquisition pipeline. Scholarpipe
//! discovers scholarship records from multiple upstream websites through
//! plug-in source adapters, validates every application link, scores page
//! quality, deduplicates, and persists only records that clear a quality
//! threshold. No synthetic record ever enters the store.
//!
//! ## Pipeline
//!
//! ```text
//! Scheduler ──▶ Orchestrator ──▶ Circuit Breaker gate ──▶ Source Adapter
//!                                                              │
//!                                            raw candidates    ▼
//! Store ◀── Ingestion Gate ◀── Normalizer ◀── Link Validator ◀── Rate Limiter + Fetcher
//! ```
//!
//! Failures propagate back into the per-source circuit breaker; a single
//! successful job closes it again.
//!
//! ## Core guarantees
//!
//! - Admitted records score at or above the configured threshold (default 70)
//! - Application URLs are absolute `http(s)` after normalization
//! - Per source, at most one job executes at a time; extra triggers coalesce
//! - Outbound requests respect per-domain spacing plus a global floor
//! - Placeholder/synthetic records are rejected at the ingestion gate
//!
//! ## Quick Start
//!
//! ```no_run
//! use scholarpipe::config::settings::load_settings;
//! use scholarpipe::config::validation::ConfigValidator;
//! use scholarpipe::services::circuit_breaker::BreakerConfig;
//! use scholarpipe::services::fetcher::{Fetcher, FetcherConfig};
//! use scholarpipe::services::ingest::IngestionGate;
//! use scholarpipe::services::orchestrator::{Orchestrator, OrchestratorConfig};
//! use scholarpipe::services::rate_limiter::RateLimiter;
//! use scholarpipe::services::store::MemoryStore;
//! use scholarpipe::services::validator::LinkValidator;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = load_settings()?;
//! let report = ConfigValidator::validate_comprehensive(&settings);
//! assert!(report.is_valid);
//!
//! let limiter = Arc::new(RateLimiter::standard());
//! let fetcher = Arc::new(Fetcher::new(FetcherConfig::default(), limiter));
//! let validator = Arc::new(LinkValidator::new(fetcher, 70));
//! let store = MemoryStore::new();
//! let gate = Arc::new(IngestionGate::new(store, 70));
//!
//! let orchestrator = Orchestrator::new(
//!     settings.sources,
//!     vec![], // registered source adapters
//!     BreakerConfig::default(),
//!     validator,
//!     gate,
//!     OrchestratorConfig::default(),
//! );
//! orchestrator.start_scheduler();
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - configuration loading and validation
//! - [`models`] - records, sources, jobs, and the API error taxonomy
//! - [`services`] - the pipeline subsystems
//! - [`routes`] - HTTP status and trigger endpoints
//! - [`middleware`] - caller-facing trigger rate limiting
//! - [`utils`] - text and URL helpers
//! - [`logs`] - logging configuration
//!
//! ## Environment Variables
//!
//! - `SCHOLARPIPE_CONFIG_PATH`: config file path (default `./config.json`)
//! - `STORE_URI`: record store location (default `memory://`)
//! - `LOG_LEVEL`: log filter (default `info`)
//! - `HTTP_TIMEOUT_MS`, `JOB_TIMEOUT_MS`, `BREAKER_THRESHOLD`,
//!   `BREAKER_COOLDOWN_MS`, `GLOBAL_CONCURRENCY`, `MIN_QUALITY_SCORE`,
//!   `USER_AGENTS`: pipeline knob overrides

pub mod config;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;
