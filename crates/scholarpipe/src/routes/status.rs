//! Read-only status surface: aggregate health and breaker views, plus the
//! idempotent breaker reset.
//!
//! Every response carries the `{success, timestamp, ...}` envelope; errors
//! render through [`PipelineError`](crate::models::error::PipelineError).

use crate::services::orchestrator::Orchestrator;
use actix_web::{web, HttpResponse, Result};
use serde_json::json;

/// `GET /status` - per-source health, breaker states, and process counters.
pub async fn get_status(orchestrator: web::Data<Orchestrator>) -> Result<HttpResponse> {
    let status = orchestrator.status().await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "scheduler_running": status.scheduler_running,
        "run_all_active": status.run_all_active,
        "sources": status.sources,
        "totals": status.totals,
    })))
}

/// `GET /breakers` - detailed circuit breaker view.
pub async fn get_breakers(orchestrator: web::Data<Orchestrator>) -> Result<HttpResponse> {
    let breakers = orchestrator.breaker_snapshots().await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "breakers": breakers,
    })))
}

/// `POST /breakers/reset` - force every breaker closed. Idempotent.
pub async fn reset_breakers(orchestrator: web::Data<Orchestrator>) -> Result<HttpResponse> {
    orchestrator.reset_breakers().await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "message": "all breakers closed",
    })))
}

/// Registers the status and breaker routes.
pub fn configure_status(cfg: &mut web::ServiceConfig) {
    cfg.route("/status", web::get().to(get_status))
        .route("/breakers", web::get().to(get_breakers))
        .route("/breakers/reset", web::post().to(reset_breakers));
}
