//! Job trigger endpoints and scrape history.
//!
//! Trigger endpoints are guarded by the caller-facing
//! [`TriggerRateLimit`](crate::middleware::trigger_limit::TriggerRateLimit)
//! middleware; history reads pass through it untouched.

use crate::middleware::trigger_limit::TriggerRateLimit;
use crate::models::error::PipelineError;
use crate::services::orchestrator::{Orchestrator, TriggerOutcome};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct RecentJobsQuery {
    pub source: Option<String>,
    pub limit: Option<usize>,
}

/// `POST /jobs/runAll` - starts a full bundle in the background.
///
/// Returns 202 with the bundle id, or 409 when a bundle is already running.
pub async fn run_all(
    orchestrator: web::Data<Orchestrator>,
) -> Result<HttpResponse, PipelineError> {
    let bundle_id = orchestrator.clone().into_inner().start_run_all()?;
    Ok(HttpResponse::Accepted().json(json!({
        "success": true,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "bundle_id": bundle_id,
    })))
}

/// `POST /jobs/run/{source_id}` - runs a single source and waits for it.
pub async fn run_source(
    orchestrator: web::Data<Orchestrator>,
    path: web::Path<String>,
) -> Result<HttpResponse, PipelineError> {
    let source_id = path.into_inner();
    match orchestrator.run_source(&source_id).await? {
        TriggerOutcome::Completed(job) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "job": job,
        }))),
        TriggerOutcome::Coalesced => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "note": "trigger coalesced into an already-running job",
        }))),
    }
}

/// `GET /jobs/recent?source=...&limit=...` - recent jobs, newest first.
pub async fn recent_jobs(
    orchestrator: web::Data<Orchestrator>,
    query: web::Query<RecentJobsQuery>,
) -> Result<HttpResponse, PipelineError> {
    let limit = query.limit.unwrap_or(20).min(100);
    let jobs = orchestrator
        .recent_jobs(query.source.as_deref(), limit)
        .await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "jobs": jobs,
    })))
}

/// Registers the `/jobs` scope behind the trigger rate limiter.
pub fn configure_jobs(cfg: &mut web::ServiceConfig, trigger_limit: TriggerRateLimit) {
    cfg.service(
        web::scope("/jobs")
            .wrap(trigger_limit)
            .route("/runAll", web::post().to(run_all))
            .route("/run/{source_id}", web::post().to(run_source))
            .route("/recent", web::get().to(recent_jobs)),
    );
}
