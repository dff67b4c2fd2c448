//! Scholarpipe server
//!
//! Binary entry point for the scholarship acquisition pipeline: loads and
//! validates configuration, wires the pipeline subsystems together, starts
//! the periodic scheduler, and serves the status/trigger HTTP API.
//!
//! Exit codes: 0 clean shutdown, 1 configuration error, 2 record store
//! unreachable.

use scholarpipe::config::settings::load_settings;
use scholarpipe::config::validation::ConfigValidator;
use scholarpipe::logs::logger::configure_logger;
use scholarpipe::middleware::trigger_limit::TriggerRateLimit;
use scholarpipe::routes::{health, jobs, status};
use scholarpipe::services::adapter::SourceAdapter;
use scholarpipe::services::circuit_breaker::BreakerConfig;
use scholarpipe::services::fetcher::{Fetcher, FetcherConfig};
use scholarpipe::services::ingest::IngestionGate;
use scholarpipe::services::orchestrator::{Orchestrator, OrchestratorConfig};
use scholarpipe::services::rate_limiter::RateLimiter;
use scholarpipe::services::store::{MemoryStore, RecordStore};
use scholarpipe::services::validator::LinkValidator;

use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting scholarpipe v{} with {} sources",
        env!("CARGO_PKG_VERSION"),
        settings.sources.len()
    );

    let report = ConfigValidator::validate_comprehensive(&settings);
    if !report.is_valid {
        error!("Configuration validation failed:");
        for e in &report.errors {
            error!("  - {}", e);
        }
        std::process::exit(1);
    }
    report.log_non_fatal();

    let store: Arc<dyn RecordStore> = match settings.pipeline.store_uri.as_str() {
        "memory://" => MemoryStore::new(),
        other => {
            error!("Record store at '{}' is not reachable from this build", other);
            std::process::exit(2);
        }
    };

    let pipeline = &settings.pipeline;
    let limiter = Arc::new(RateLimiter::standard());
    let fetcher = Arc::new(Fetcher::new(
        FetcherConfig {
            connect_timeout: Duration::from_millis(pipeline.connect_timeout_ms),
            request_timeout: Duration::from_millis(pipeline.http_timeout_ms),
            accept_invalid_certs: pipeline.accept_invalid_certs,
            user_agents: pipeline.user_agents.clone(),
            ..FetcherConfig::default()
        },
        limiter,
    ));
    let validator = Arc::new(LinkValidator::new(
        fetcher.clone(),
        pipeline.min_quality_score,
    ));
    let gate = Arc::new(IngestionGate::new(store, pipeline.min_quality_score));

    // Site-specific adapters register here; each deployment links the
    // adapter crates for the sources it is configured to scrape.
    let adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    let orchestrator = Orchestrator::new(
        settings.sources.clone(),
        adapters,
        BreakerConfig {
            threshold: pipeline.breaker_threshold,
            cool_down: Duration::from_millis(pipeline.breaker_cooldown_ms),
        },
        validator,
        gate,
        OrchestratorConfig {
            global_concurrency: pipeline.global_concurrency,
            job_timeout: Duration::from_millis(pipeline.job_timeout_ms),
            ..OrchestratorConfig::default()
        },
    );
    orchestrator.start_scheduler();

    let trigger_limit = TriggerRateLimit::per_hour(pipeline.trigger_limit_per_hour);
    let orchestrator_data = web::Data::from(orchestrator.clone());

    // App-wide fallback limiter; the trigger endpoints carry their own
    // much tighter per-caller budget on top of this.
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(100)
        .burst_size(200)
        .finish()
        .unwrap();

    let host = std::env::var("SCHOLARPIPE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("SCHOLARPIPE_PORT")
        .unwrap_or_else(|_| "5930".to_string())
        .parse::<u16>()
        .unwrap_or(5930);

    info!("Starting server on {}:{}", host, port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(orchestrator_data.clone())
            .wrap(Governor::new(&governor_conf))
            .wrap(Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
            ))
            .wrap(actix_web::middleware::Compress::default())
            .configure(health::configure_health)
            .configure(status::configure_status)
            .configure(|cfg| jobs::configure_jobs(cfg, trigger_limit.clone()))
    })
    .bind((host.as_str(), port))?
    .run();

    info!("Server started successfully");

    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("Server stopped gracefully"),
                Err(e) => error!("Server error: {}", e),
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping server...");
            orchestrator.cancel_active_jobs();
            orchestrator.stop_scheduler();
        }
    }

    Ok(())
}
