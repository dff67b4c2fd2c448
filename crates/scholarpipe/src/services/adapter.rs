//! Source adapter plug-in contract.
//!
//! Each upstream site registers one adapter. Adapters extract raw
//! [`CandidateRecord`]s and nothing else: they never touch the store, route
//! all HTTP through the shared rate-limited [`Fetcher`](crate::services::fetcher::Fetcher)
//! they were constructed with, and never synthesize records that were not
//! actually extracted upstream. An adapter that finds nothing returns an
//! empty vector; the circuit breaker tracks persistent emptiness separately.

use crate::models::record::CandidateRecord;
use crate::services::fetcher::FetchError;
use futures::future::BoxFuture;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("upstream fetch failed: {0}")]
    Upstream(String),
    #[error("extraction failed: {0}")]
    Extraction(String),
}

impl From<FetchError> for AdapterError {
    fn from(e: FetchError) -> Self {
        AdapterError::Upstream(e.to_string())
    }
}

/// A pluggable scholarship source.
///
/// Implementations hold whatever they need (typically an
/// `Arc<Fetcher>` plus selectors for their site); the orchestrator only sees
/// this interface.
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier matching the configured [`SourceSpec`](crate::models::source::SourceSpec).
    fn identifier(&self) -> &str;

    /// Base URL for resolving relative application links.
    fn base_url(&self) -> &str;

    /// Extracts the current candidate set from the upstream site.
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<CandidateRecord>, AdapterError>>;
}
