//! Caller-facing rate limiting for job trigger endpoints.
//!
//! Scrape triggers are expensive; a caller gets a fixed number per sliding
//! window (default 10 per hour), keyed by peer address. Exceeding the limit
//! yields 429 with a `Retry-After` header computed from the oldest call in
//! the window. This is separate from the per-domain limiter, which protects
//! upstreams rather than this service.

use crate::models::error::PipelineError;
use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    error::ResponseError,
    Error as ActixError,
};
use futures::future::{LocalBoxFuture, Ready};
use log::{debug, warn};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    task::{Context, Poll},
    time::{Duration, Instant},
};

/// Sliding-window state per caller.
#[derive(Debug, Default)]
struct TriggerLimitStore {
    entries: RwLock<HashMap<String, Vec<Instant>>>,
    last_cleanup: RwLock<Option<Instant>>,
}

impl TriggerLimitStore {
    /// Records a call for `key` when under the limit, otherwise returns the
    /// seconds the caller should wait.
    fn check(&self, key: &str, limit: u64, window: Duration) -> Result<(), u64> {
        self.cleanup(window);

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        let calls = entries.entry(key.to_string()).or_default();
        calls.retain(|t| now.duration_since(*t) < window);

        if (calls.len() as u64) < limit {
            calls.push(now);
            return Ok(());
        }

        let retry_after = calls
            .first()
            .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(window);
        Err(retry_after.as_secs().max(1))
    }

    fn cleanup(&self, window: Duration) {
        let now = Instant::now();
        {
            let mut last = self
                .last_cleanup
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match *last {
                Some(t) if now.duration_since(t) < Duration::from_secs(600) => return,
                _ => *last = Some(now),
            }
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, calls| {
                calls.retain(|t| now.duration_since(*t) < window);
                !calls.is_empty()
            });
            debug!("Trigger limiter cleanup: {} callers retained", entries.len());
        }
    }
}

/// Middleware factory limiting trigger calls per caller.
#[derive(Clone)]
pub struct TriggerRateLimit {
    limit: u64,
    window: Duration,
    store: Arc<TriggerLimitStore>,
}

impl TriggerRateLimit {
    /// `limit` calls per sliding hour per caller.
    pub fn per_hour(limit: u64) -> Self {
        Self::new(limit, Duration::from_secs(3600))
    }

    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window,
            store: Arc::new(TriggerLimitStore::default()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TriggerRateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Transform = TriggerRateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        futures::future::ready(Ok(TriggerRateLimitMiddleware {
            service: Arc::new(service),
            limit: self.limit,
            window: self.window,
            store: self.store.clone(),
        }))
    }
}

pub struct TriggerRateLimitMiddleware<S> {
    service: Arc<S>,
    limit: u64,
    window: Duration,
    store: Arc<TriggerLimitStore>,
}

impl<S, B> Service<ServiceRequest> for TriggerRateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limit = self.limit;
        let window = self.window;
        let store = self.store.clone();

        Box::pin(async move {
            // GET requests (status/history reads) pass through untouched.
            if req.method() == actix_web::http::Method::GET {
                return service.call(req).await.map(|res| res.map_into_left_body());
            }

            let key = req
                .connection_info()
                .peer_addr()
                .unwrap_or("unknown")
                .to_string();

            match store.check(&key, limit, window) {
                Ok(()) => service.call(req).await.map(|res| res.map_into_left_body()),
                Err(retry_after_secs) => {
                    warn!("Trigger rate limit exceeded for {}", key);
                    let response =
                        PipelineError::TriggerRateLimited { retry_after_secs }.error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}
