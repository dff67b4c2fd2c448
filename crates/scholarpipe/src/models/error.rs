use actix_web::http::header;
use actix_web::HttpResponse;
use serde_json::json;

/// API-facing error taxonomy for the pipeline's HTTP surface.
///
/// Each variant maps to a stable machine-readable `code` and an HTTP status.
/// Trigger endpoints return these verbatim; component-level failures (fetch,
/// store, adapter) are converted into this taxonomy at the route boundary and
/// never leak raw lower-level errors to callers.
///
/// # Response Format
///
/// ```json
/// {
///   "success": false,
///   "error": "a RunAllNow bundle is already executing",
///   "code": "run_in_progress",
///   "timestamp": "2025-03-15T10:30:00Z"
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("unknown source: {id}")]
    SourceNotFound { id: String },

    #[error("a RunAllNow bundle is already executing")]
    RunAllInProgress,

    #[error("trigger rate limit exceeded, retry after {retry_after_secs}s")]
    TriggerRateLimited { retry_after_secs: u64 },

    #[error("record store error: {message}")]
    Store { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PipelineError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Config { .. } => "config_error",
            PipelineError::SourceNotFound { .. } => "source_not_found",
            PipelineError::RunAllInProgress => "run_in_progress",
            PipelineError::TriggerRateLimited { .. } => "rate_limited",
            PipelineError::Store { .. } => "store_error",
            PipelineError::Internal { .. } => "internal_error",
        }
    }

    fn body(&self) -> serde_json::Value {
        json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}

impl actix_web::error::ResponseError for PipelineError {
    fn error_response(&self) -> HttpResponse {
        match self {
            PipelineError::Config { .. } => HttpResponse::InternalServerError().json(self.body()),
            PipelineError::SourceNotFound { .. } => HttpResponse::NotFound().json(self.body()),
            PipelineError::RunAllInProgress => HttpResponse::Conflict().json(self.body()),
            PipelineError::TriggerRateLimited { retry_after_secs } => {
                HttpResponse::TooManyRequests()
                    .insert_header((header::RETRY_AFTER, retry_after_secs.to_string()))
                    .json(self.body())
            }
            PipelineError::Store { .. } => HttpResponse::ServiceUnavailable().json(self.body()),
            PipelineError::Internal { .. } => HttpResponse::InternalServerError().json(self.body()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::error::ResponseError;
    use actix_web::http::StatusCode;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            PipelineError::SourceNotFound { id: "x".into() }.code(),
            "source_not_found"
        );
        assert_eq!(PipelineError::RunAllInProgress.code(), "run_in_progress");
        assert_eq!(
            PipelineError::TriggerRateLimited {
                retry_after_secs: 60
            }
            .code(),
            "rate_limited"
        );
    }

    #[test]
    fn test_status_mapping() {
        let resp = PipelineError::RunAllInProgress.error_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = PipelineError::SourceNotFound { id: "x".into() }.error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let resp = PipelineError::TriggerRateLimited {
            retry_after_secs: 360,
        }
        .error_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let header = resp
            .headers()
            .get(actix_web::http::header::RETRY_AFTER)
            .expect("Retry-After header present");
        assert_eq!(header.to_str().unwrap(), "360");
    }
}
