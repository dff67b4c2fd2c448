use actix_web::{web, HttpResponse, Result};
use once_cell::sync::Lazy;
use serde_json::json;
use std::time::Instant;

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// General health check with service metadata.
///
/// # Response Format
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.3.2",
///   "timestamp": "2025-03-15T10:30:00Z",
///   "uptime_seconds": 3600
/// }
/// ```
pub async fn health_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": PROCESS_START.elapsed().as_secs(),
    })))
}

/// Readiness probe: the service can accept traffic.
pub async fn readiness_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ready",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Liveness probe: the process is functioning and should not be restarted.
pub async fn liveness_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Registers `/health`, `/ready`, and `/live`.
pub fn configure_health(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check))
        .route("/live", web::get().to(liveness_check));
}
