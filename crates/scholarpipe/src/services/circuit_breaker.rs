//! Circuit breaker registry for upstream source protection.
//!
//! One breaker per source limits repeated attempts against a failing upstream
//! and provides fast skip decisions when a source is known-bad. Counters use
//! atomics on the hot path; the async lock guards only the opened-at
//! timestamp used for cool-down checks.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Consecutive zero-candidate runs that together count as one soft failure.
const ZERO_CANDIDATE_RUNS_PER_FAILURE: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed = 0,   // Normal operation
    Open = 1,     // Circuit is open, skipping jobs
    HalfOpen = 2, // Cool-down elapsed, one trial permitted
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Configuration parameters for breaker behavior.
///
/// * `threshold` - consecutive failures that open the circuit (default: 3)
/// * `cool_down` - wait before an OPEN circuit permits one trial (default: 5 min)
///
/// A single successful job closes the circuit and zeroes the failure counter,
/// regardless of how many successes a recovery "should" take.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub threshold: u64,
    pub cool_down: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            cool_down: Duration::from_secs(5 * 60),
        }
    }
}

/// Gate decision for a job about to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerDecision {
    /// Circuit closed; dispatch normally.
    Proceed,
    /// Circuit was open and the cool-down elapsed; this is the trial attempt.
    Trial,
    /// Circuit open and cooling down; skip the job.
    Skip,
}

/// Point-in-time view of one breaker, for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub source_id: String,
    pub state: CircuitState,
    pub consecutive_failures: u64,
    pub zero_candidate_runs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Milliseconds until the cool-down elapses, when the circuit is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cool_down_remaining_ms: Option<u64>,
}

/// Per-source circuit breaker.
///
/// # States
///
/// - **Closed**: normal operation, jobs dispatch
/// - **Open**: jobs are skipped until the cool-down elapses
/// - **HalfOpen**: one trial job probes recovery
///
/// # Thread Safety
///
/// State and counters are atomics; the opened-at timestamp sits behind an
/// async `RwLock` taken only during transitions and cool-down checks, never
/// across I/O.
#[derive(Debug)]
pub struct SourceBreaker {
    config: BreakerConfig,
    state: AtomicU8,
    consecutive_failures: AtomicU64,
    zero_candidate_runs: AtomicU64,
    opened_at: RwLock<Option<Instant>>,
    last_failure_at: RwLock<Option<DateTime<Utc>>>,
    source_id: String,
}

impl SourceBreaker {
    pub fn new(source_id: String, config: BreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            consecutive_failures: AtomicU64::new(0),
            zero_candidate_runs: AtomicU64::new(0),
            opened_at: RwLock::new(None),
            last_failure_at: RwLock::new(None),
            source_id,
        })
    }

    /// Decides whether a job for this source may dispatch.
    ///
    /// An OPEN circuit whose cool-down has elapsed transitions to HalfOpen
    /// and admits the caller as the trial attempt.
    pub async fn try_acquire(&self) -> BreakerDecision {
        match self.state() {
            CircuitState::Closed => BreakerDecision::Proceed,
            CircuitState::HalfOpen => BreakerDecision::Trial,
            CircuitState::Open => {
                let elapsed = self.opened_at.read().await.map(|t| t.elapsed());
                match elapsed {
                    Some(e) if e >= self.config.cool_down => {
                        self.transition_to_half_open().await;
                        BreakerDecision::Trial
                    }
                    Some(_) => BreakerDecision::Skip,
                    // Open with no timestamp shouldn't happen; fail open.
                    None => BreakerDecision::Proceed,
                }
            }
        }
    }

    /// Records a successful job: one success closes the circuit and resets
    /// both the failure counter and the zero-candidate streak.
    pub async fn on_success(&self) {
        self.zero_candidate_runs.store(0, Ordering::Relaxed);
        self.record_success_internal().await;
    }

    /// Records a failed job.
    pub async fn on_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                *self.last_failure_at.write().await = Some(Utc::now());
                if failures >= self.config.threshold {
                    self.transition_to_open().await;
                }
            }
            CircuitState::HalfOpen => {
                // Any failure during the trial reopens the circuit.
                self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                *self.last_failure_at.write().await = Some(Utc::now());
                self.transition_to_open().await;
            }
            CircuitState::Open => {
                *self.last_failure_at.write().await = Some(Utc::now());
            }
        }
    }

    /// Records a job that completed without error but yielded zero
    /// candidates. Three such runs in a row count as one soft failure.
    ///
    /// Returns `true` when this call escalated the streak into a failure.
    pub async fn on_empty_fetch(&self) -> bool {
        let runs = self.zero_candidate_runs.fetch_add(1, Ordering::Relaxed) + 1;
        if runs >= ZERO_CANDIDATE_RUNS_PER_FAILURE {
            self.zero_candidate_runs.store(0, Ordering::Relaxed);
            warn!(
                "Source {} returned zero candidates {} runs in a row, counting one failure",
                self.source_id, runs
            );
            self.on_failure().await;
            true
        } else {
            debug!(
                "Source {} returned zero candidates ({} consecutive)",
                self.source_id, runs
            );
            // Still a successful run, but the streak survives it.
            self.record_success_internal().await;
            false
        }
    }

    /// Explicit admin reset: any state becomes CLOSED with clean counters.
    pub async fn reset(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.zero_candidate_runs.store(0, Ordering::Relaxed);
        *self.opened_at.write().await = None;
        info!("Circuit breaker {} reset to closed", self.source_id);
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Relaxed))
    }

    pub fn failure_count(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub async fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state();
        let cool_down_remaining_ms = if state == CircuitState::Open {
            self.opened_at.read().await.map(|t| {
                self.config
                    .cool_down
                    .saturating_sub(t.elapsed())
                    .as_millis() as u64
            })
        } else {
            None
        };
        BreakerSnapshot {
            source_id: self.source_id.clone(),
            state,
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            zero_candidate_runs: self.zero_candidate_runs.load(Ordering::Relaxed),
            last_failure_at: *self.last_failure_at.read().await,
            cool_down_remaining_ms,
        }
    }

    async fn record_success_internal(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        match self.state() {
            CircuitState::Closed => {}
            CircuitState::HalfOpen | CircuitState::Open => {
                self.state
                    .store(CircuitState::Closed as u8, Ordering::Relaxed);
                *self.opened_at.write().await = None;
                info!(
                    "Circuit breaker {} closed - source recovered",
                    self.source_id
                );
            }
        }
    }

    async fn transition_to_open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Relaxed);
        *self.opened_at.write().await = Some(Instant::now());
        warn!("Circuit breaker {} opened due to failures", self.source_id);
    }

    async fn transition_to_half_open(&self) {
        self.state
            .store(CircuitState::HalfOpen as u8, Ordering::Relaxed);
        info!(
            "Circuit breaker {} transitioned to half-open",
            self.source_id
        );
    }
}

/// Registry of breakers keyed by source identifier.
///
/// Built once at startup from the configured source list; the map itself is
/// immutable afterwards, so lookups need no lock.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: AHashMap<String, Arc<SourceBreaker>>,
}

impl BreakerRegistry {
    pub fn new(source_ids: impl IntoIterator<Item = String>, config: BreakerConfig) -> Self {
        let breakers = source_ids
            .into_iter()
            .map(|id| {
                let breaker = SourceBreaker::new(id.clone(), config.clone());
                (id, breaker)
            })
            .collect();
        Self { breakers }
    }

    pub fn get(&self, source_id: &str) -> Option<Arc<SourceBreaker>> {
        self.breakers.get(source_id).cloned()
    }

    /// Forces every breaker closed. Idempotent.
    pub async fn reset_all(&self) {
        for breaker in self.breakers.values() {
            breaker.reset().await;
        }
    }

    pub async fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut out = Vec::with_capacity(self.breakers.len());
        for breaker in self.breakers.values() {
            out.push(breaker.snapshot().await);
        }
        out.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        out
    }
}
