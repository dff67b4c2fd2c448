//! Job orchestration: scheduling, dispatch, concurrency, and status.
//!
//! The orchestrator owns the breaker registry, the validator, the ingestion
//! gate, and the registered source adapters. It dispatches one job per
//! source at a time, bounds global job concurrency with a semaphore, and
//! records a ring of recent jobs per source for the status API.
//!
//! Jobs are cooperative: cancellation (external or via the per-job soft cap)
//! drops the job future at its next await point, aborting in-flight HTTP
//! while leaving already-admitted records in the store.

use crate::models::error::PipelineError;
use crate::models::job::{JobCounts, JobOutcome, RunSummary, ScrapeJob};
use crate::models::source::SourceSpec;
use crate::services::adapter::SourceAdapter;
use crate::services::circuit_breaker::{
    BreakerConfig, BreakerDecision, BreakerRegistry, BreakerSnapshot,
};
use crate::services::ingest::{Admission, IngestionGate};
use crate::services::normalizer::RecordNormalizer;
use crate::services::validator::LinkValidator;
use ahash::AHashMap;
use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use uuid::Uuid;

/// Consecutive store failures within one job that fail the whole job.
const STORE_ERROR_THRESHOLD: u32 = 3;

/// Recent jobs retained per source for the status API.
const JOB_HISTORY_DEPTH: usize = 20;

/// Orchestrator tunables.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum concurrently executing scrape jobs.
    pub global_concurrency: usize,
    /// Soft cap per job; exceeding it cancels the job.
    pub job_timeout: Duration,
    /// Scheduler wake-up cadence.
    pub scheduler_tick: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            global_concurrency: 3,
            job_timeout: Duration::from_secs(10 * 60),
            scheduler_tick: Duration::from_secs(30),
        }
    }
}

/// Result of an ad-hoc trigger.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// The job ran (or was skipped by its breaker/enabled flag).
    Completed(ScrapeJob),
    /// A job for this source was already running or queued; the trigger was
    /// dropped and noted.
    Coalesced,
}

/// Process-lifetime counters, aggregated across every job.
#[derive(Debug, Default)]
struct PipelineCounters {
    candidates: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
    duplicates: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CountersSnapshot {
    pub total_candidates: u64,
    pub total_admitted: u64,
    pub total_rejected: u64,
    pub total_duplicates: u64,
}

/// Per-source view for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub breaker: BreakerSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_job: Option<ScrapeJob>,
    pub coalesced_triggers: u64,
}

/// Aggregate health view.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub scheduler_running: bool,
    pub run_all_active: bool,
    pub sources: Vec<SourceStatus>,
    pub totals: CountersSnapshot,
}

/// Mutable per-job tally, shared with the job future so counts survive
/// cancellation mid-flight.
#[derive(Debug, Default)]
struct JobAccumulator {
    candidates: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
    duplicates: AtomicU64,
    validation_failures: AtomicU64,
    first_error: std::sync::Mutex<Option<String>>,
}

impl JobAccumulator {
    fn note_error(&self, message: String) {
        let mut slot = self
            .first_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_none() {
            *slot = Some(message);
        }
    }

    fn counts(&self) -> JobCounts {
        JobCounts {
            candidates: self.candidates.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
        }
    }

    fn first_error(&self) -> Option<String> {
        self.first_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Resets the per-source running flag even when the job future is dropped.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The pipeline orchestrator. Constructed once at startup and shared as
/// `Arc<Orchestrator>`.
pub struct Orchestrator {
    config: OrchestratorConfig,
    sources: Vec<SourceSpec>,
    adapters: AHashMap<String, Arc<dyn SourceAdapter>>,
    breakers: BreakerRegistry,
    validator: Arc<LinkValidator>,
    normalizer: RecordNormalizer,
    gate: Arc<IngestionGate>,
    enabled: AHashMap<String, AtomicBool>,
    running: AHashMap<String, AtomicBool>,
    coalesced: AHashMap<String, AtomicU64>,
    history: RwLock<AHashMap<String, VecDeque<ScrapeJob>>>,
    counters: PipelineCounters,
    job_semaphore: Arc<Semaphore>,
    run_all_active: AtomicBool,
    scheduler_started: AtomicBool,
    scheduler_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    cancel: std::sync::RwLock<watch::Sender<bool>>,
}

impl Orchestrator {
    pub fn new(
        sources: Vec<SourceSpec>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        breaker_config: BreakerConfig,
        validator: Arc<LinkValidator>,
        gate: Arc<IngestionGate>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        let adapters: AHashMap<String, Arc<dyn SourceAdapter>> = adapters
            .into_iter()
            .map(|a| (a.identifier().to_string(), a))
            .collect();

        for spec in &sources {
            if !adapters.contains_key(&spec.id) {
                warn!("Source '{}' has no registered adapter", spec.id);
            }
        }

        let enabled = sources
            .iter()
            .map(|s| (s.id.clone(), AtomicBool::new(s.enabled)))
            .collect();
        let running = sources
            .iter()
            .map(|s| (s.id.clone(), AtomicBool::new(false)))
            .collect();
        let coalesced = sources
            .iter()
            .map(|s| (s.id.clone(), AtomicU64::new(0)))
            .collect();

        let breakers =
            BreakerRegistry::new(sources.iter().map(|s| s.id.clone()), breaker_config);
        let (cancel_tx, _) = watch::channel(false);

        Arc::new(Self {
            job_semaphore: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            config,
            sources,
            adapters,
            breakers,
            validator,
            normalizer: RecordNormalizer::new(),
            gate,
            enabled,
            running,
            coalesced,
            history: RwLock::new(AHashMap::new()),
            counters: PipelineCounters::default(),
            run_all_active: AtomicBool::new(false),
            scheduler_started: AtomicBool::new(false),
            scheduler_handle: std::sync::Mutex::new(None),
            cancel: std::sync::RwLock::new(cancel_tx),
        })
    }

    /// Begins periodic dispatch. Idempotent; a second call is a no-op.
    pub fn start_scheduler(self: &Arc<Self>) {
        if self.scheduler_started.swap(true, Ordering::SeqCst) {
            debug!("Scheduler already running");
            return;
        }

        let this = self.clone();
        let handle = tokio::spawn(async move {
            let mut next_run: AHashMap<String, tokio::time::Instant> = this
                .sources
                .iter()
                .map(|s| {
                    (
                        s.id.clone(),
                        tokio::time::Instant::now() + s.effective_interval(),
                    )
                })
                .collect();

            let mut tick = tokio::time::interval(this.config.scheduler_tick);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            info!(
                "Scheduler started for {} sources (tick {:?})",
                this.sources.len(),
                this.config.scheduler_tick
            );

            loop {
                tick.tick().await;
                let now = tokio::time::Instant::now();
                for spec in &this.sources {
                    if !this.is_enabled(&spec.id) {
                        continue;
                    }
                    let due = match next_run.get(&spec.id) {
                        Some(t) => *t,
                        None => continue,
                    };
                    if now >= due {
                        next_run.insert(spec.id.clone(), now + spec.effective_interval());
                        let this = this.clone();
                        let spec = spec.clone();
                        tokio::spawn(async move {
                            let _ = this.run_spec(&spec).await;
                        });
                    }
                }
            }
        });

        *self
            .scheduler_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
    }

    /// Whether the periodic scheduler has been started.
    pub fn scheduler_running(&self) -> bool {
        self.scheduler_started.load(Ordering::SeqCst)
    }

    /// Stops the scheduler task. Running jobs are unaffected.
    pub fn stop_scheduler(&self) {
        if let Some(handle) = self
            .scheduler_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            handle.abort();
        }
        self.scheduler_started.store(false, Ordering::SeqCst);
    }

    /// Runs one source ad hoc.
    pub async fn run_source(&self, source_id: &str) -> Result<TriggerOutcome, PipelineError> {
        let spec = self
            .sources
            .iter()
            .find(|s| s.id == source_id)
            .cloned()
            .ok_or_else(|| PipelineError::SourceNotFound {
                id: source_id.to_string(),
            })?;
        Ok(self.run_spec(&spec).await)
    }

    /// Fans out over every source and waits for the bundle to finish.
    ///
    /// Only one bundle may execute at a time; a concurrent call fails with
    /// [`PipelineError::RunAllInProgress`] and has no side effects.
    pub async fn run_all_now(self: &Arc<Self>) -> Result<RunSummary, PipelineError> {
        let bundle_id = self.begin_run_all()?;
        Ok(self.clone().execute_run_all(bundle_id).await)
    }

    /// Starts a `RunAllNow` bundle in the background and returns its id
    /// immediately. Same exclusivity rule as [`run_all_now`](Self::run_all_now).
    pub fn start_run_all(self: &Arc<Self>) -> Result<Uuid, PipelineError> {
        let bundle_id = self.begin_run_all()?;
        let this = self.clone();
        tokio::spawn(async move {
            let summary = this.execute_run_all(bundle_id).await;
            let totals = summary.totals();
            info!(
                "RunAll bundle {} finished: {} jobs, {} admitted, {} rejected",
                bundle_id,
                summary.jobs.len(),
                totals.admitted,
                totals.rejected
            );
        });
        Ok(bundle_id)
    }

    /// Signals every active job to stop at its next suspension point.
    ///
    /// Records admitted before the signal stay in the store; affected jobs
    /// finish as `failed` with reason `cancelled` and their breakers are not
    /// penalized.
    pub fn cancel_active_jobs(&self) {
        let fresh = watch::channel(false).0;
        let old = {
            let mut guard = self
                .cancel
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *guard, fresh)
        };
        let _ = old.send(true);
        info!("Cancellation signalled to active jobs");
    }

    /// Forces every breaker closed. Idempotent.
    pub async fn reset_breakers(&self) {
        self.breakers.reset_all().await;
    }

    /// Admin enable/disable for a source.
    pub fn set_source_enabled(&self, source_id: &str, enabled: bool) -> Result<(), PipelineError> {
        match self.enabled.get(source_id) {
            Some(flag) => {
                flag.store(enabled, Ordering::SeqCst);
                info!(
                    "Source '{}' {}",
                    source_id,
                    if enabled { "enabled" } else { "disabled" }
                );
                Ok(())
            }
            None => Err(PipelineError::SourceNotFound {
                id: source_id.to_string(),
            }),
        }
    }

    pub fn is_enabled(&self, source_id: &str) -> bool {
        self.enabled
            .get(source_id)
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Detailed breaker view for the status API.
    pub async fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots().await
    }

    /// Aggregate health: per-source breaker state, last job, counters.
    pub async fn status(&self) -> PipelineStatus {
        let history = self.history.read().await;
        let mut sources = Vec::with_capacity(self.sources.len());
        for spec in &self.sources {
            let breaker = match self.breakers.get(&spec.id) {
                Some(b) => b.snapshot().await,
                None => continue,
            };
            let last_job = history
                .get(&spec.id)
                .and_then(|ring| ring.back())
                .cloned();
            sources.push(SourceStatus {
                id: spec.id.clone(),
                name: spec.name.clone(),
                enabled: self.is_enabled(&spec.id),
                breaker,
                last_job,
                coalesced_triggers: self
                    .coalesced
                    .get(&spec.id)
                    .map(|c| c.load(Ordering::Relaxed))
                    .unwrap_or(0),
            });
        }

        PipelineStatus {
            scheduler_running: self.scheduler_running(),
            run_all_active: self.run_all_active.load(Ordering::SeqCst),
            sources,
            totals: CountersSnapshot {
                total_candidates: self.counters.candidates.load(Ordering::Relaxed),
                total_admitted: self.counters.admitted.load(Ordering::Relaxed),
                total_rejected: self.counters.rejected.load(Ordering::Relaxed),
                total_duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            },
        }
    }

    /// Recent jobs, newest first, optionally filtered by source.
    pub async fn recent_jobs(&self, source_id: Option<&str>, limit: usize) -> Vec<ScrapeJob> {
        let history = self.history.read().await;
        let mut jobs: Vec<ScrapeJob> = match source_id {
            Some(id) => history
                .get(id)
                .map(|ring| ring.iter().cloned().collect())
                .unwrap_or_default(),
            None => history
                .values()
                .flat_map(|ring| ring.iter().cloned())
                .collect(),
        };
        jobs.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        jobs.truncate(limit);
        jobs
    }

    /// Identifiers of all configured sources.
    pub fn source_ids(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.id.clone()).collect()
    }

    fn begin_run_all(&self) -> Result<Uuid, PipelineError> {
        if self
            .run_all_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::RunAllInProgress);
        }
        Ok(Uuid::new_v4())
    }

    async fn execute_run_all(self: Arc<Self>, bundle_id: Uuid) -> RunSummary {
        let started_at = Utc::now();
        info!(
            "RunAll bundle {} dispatching {} sources",
            bundle_id,
            self.sources.len()
        );

        let outcomes = join_all(
            self.sources
                .iter()
                .map(|spec| self.run_spec(spec)),
        )
        .await;

        let jobs = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                TriggerOutcome::Completed(job) => Some(job),
                TriggerOutcome::Coalesced => None,
            })
            .collect();

        self.run_all_active.store(false, Ordering::SeqCst);

        RunSummary {
            bundle_id,
            started_at,
            finished_at: Utc::now(),
            jobs,
        }
    }

    /// Runs one job for `spec`: coalescing, concurrency gate, breaker gate,
    /// execution with cancellation and the soft cap, then bookkeeping.
    async fn run_spec(&self, spec: &SourceSpec) -> TriggerOutcome {
        let running = match self.running.get(&spec.id) {
            Some(flag) => flag,
            None => {
                return TriggerOutcome::Completed(ScrapeJob::skipped(
                    &spec.id,
                    JobOutcome::Failed {
                        reason: "unknown source".to_string(),
                    },
                ))
            }
        };

        if running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            if let Some(counter) = self.coalesced.get(&spec.id) {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            debug!("Trigger for '{}' coalesced into running job", spec.id);
            return TriggerOutcome::Coalesced;
        }
        let _running_guard = RunningGuard(running);

        let _permit = self
            .job_semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("job semaphore closed");

        if !self.is_enabled(&spec.id) {
            let job = ScrapeJob::skipped(&spec.id, JobOutcome::SkippedDisabled);
            self.record_job(job.clone()).await;
            return TriggerOutcome::Completed(job);
        }

        let breaker = match self.breakers.get(&spec.id) {
            Some(b) => b,
            None => {
                return TriggerOutcome::Completed(ScrapeJob::skipped(
                    &spec.id,
                    JobOutcome::Failed {
                        reason: "no breaker registered".to_string(),
                    },
                ))
            }
        };

        match breaker.try_acquire().await {
            BreakerDecision::Skip => {
                debug!("Skipping '{}': breaker open", spec.id);
                let job = ScrapeJob::skipped(&spec.id, JobOutcome::SkippedBreakerOpen);
                self.record_job(job.clone()).await;
                return TriggerOutcome::Completed(job);
            }
            BreakerDecision::Trial => {
                info!("Trial job for '{}' after breaker cool-down", spec.id);
            }
            BreakerDecision::Proceed => {}
        }

        let started_at = Utc::now();
        let acc = Arc::new(JobAccumulator::default());
        let cancel_rx = self
            .cancel
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .subscribe();

        let body = self.execute_job(spec, acc.clone());
        let outcome = tokio::select! {
            _ = wait_cancelled(cancel_rx) => {
                warn!("Job for '{}' cancelled", spec.id);
                JobOutcome::cancelled()
            }
            capped = timeout(self.config.job_timeout, body) => match capped {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        "Job for '{}' exceeded {:?} soft cap, cancelling",
                        spec.id, self.config.job_timeout
                    );
                    JobOutcome::cancelled()
                }
            },
        };

        // Breaker bookkeeping: cancellation is neutral, quality rejections
        // are not failures, persistent emptiness is tracked separately.
        match &outcome {
            JobOutcome::Failed { .. } if outcome.is_cancelled() => {}
            JobOutcome::Failed { .. } => breaker.on_failure().await,
            JobOutcome::Success => {
                if acc.candidates.load(Ordering::Relaxed) == 0 {
                    breaker.on_empty_fetch().await;
                } else {
                    breaker.on_success().await;
                }
            }
            JobOutcome::SkippedBreakerOpen | JobOutcome::SkippedDisabled => {}
        }

        let counts = acc.counts();
        self.counters
            .candidates
            .fetch_add(counts.candidates, Ordering::Relaxed);
        self.counters
            .admitted
            .fetch_add(counts.admitted, Ordering::Relaxed);
        self.counters
            .rejected
            .fetch_add(counts.rejected, Ordering::Relaxed);
        self.counters
            .duplicates
            .fetch_add(counts.duplicates, Ordering::Relaxed);

        let job = ScrapeJob {
            source_id: spec.id.clone(),
            started_at,
            finished_at: Utc::now(),
            outcome,
            counts,
            first_error: acc.first_error(),
        };
        self.record_job(job.clone()).await;
        TriggerOutcome::Completed(job)
    }

    /// The job body: adapter fetch, then normalize, validate, and ingest
    /// each candidate. Runs inside the cancellation/timeout envelope.
    async fn execute_job(&self, spec: &SourceSpec, acc: Arc<JobAccumulator>) -> JobOutcome {
        let adapter = match self.adapters.get(&spec.id) {
            Some(a) => a.clone(),
            None => {
                let reason = format!("no adapter registered for '{}'", spec.id);
                acc.note_error(reason.clone());
                return JobOutcome::Failed { reason };
            }
        };

        let candidates = match adapter.fetch().await {
            Ok(candidates) => candidates,
            Err(e) => {
                let reason = e.to_string();
                warn!("Adapter '{}' failed: {}", spec.id, reason);
                acc.note_error(reason.clone());
                return JobOutcome::Failed { reason };
            }
        };

        acc.candidates
            .store(candidates.len() as u64, Ordering::Relaxed);
        debug!("Source '{}' yielded {} candidates", spec.id, candidates.len());
        let scraped_at = Utc::now();

        let mut prepared = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            match self
                .normalizer
                .normalize(candidate, adapter.base_url(), Utc::now())
            {
                Ok(normalized) => prepared.push(normalized),
                Err(e) => {
                    debug!("Dropping malformed candidate from '{}': {}", spec.id, e);
                    acc.validation_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let items: Vec<(String, String)> = prepared
            .iter()
            .map(|r| (r.title.clone(), r.application_url.clone()))
            .collect();
        let validations = self.validator.validate_batch(&items).await;

        let mut consecutive_store_errors: u32 = 0;
        for (record, validation) in prepared.into_iter().zip(validations.iter()) {
            if !validation.accessible {
                acc.validation_failures.fetch_add(1, Ordering::Relaxed);
                if let Some(first) = validation.errors.first() {
                    acc.note_error(first.clone());
                }
                continue;
            }

            match self.gate.admit(record, validation, &spec.id, scraped_at).await {
                Ok(Admission::Inserted) => {
                    acc.admitted.fetch_add(1, Ordering::Relaxed);
                    consecutive_store_errors = 0;
                }
                Ok(Admission::Updated) => {
                    acc.duplicates.fetch_add(1, Ordering::Relaxed);
                    consecutive_store_errors = 0;
                }
                Ok(Admission::RejectedQuality { .. })
                | Ok(Admission::RejectedPlaceholder { .. }) => {
                    acc.rejected.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    error!("Store error during '{}': {}", spec.id, e);
                    acc.note_error(e.to_string());
                    consecutive_store_errors += 1;
                    if consecutive_store_errors >= STORE_ERROR_THRESHOLD {
                        return JobOutcome::Failed {
                            reason: format!(
                                "{} consecutive store errors",
                                consecutive_store_errors
                            ),
                        };
                    }
                }
            }
        }

        JobOutcome::Success
    }

    async fn record_job(&self, job: ScrapeJob) {
        let mut history = self.history.write().await;
        let ring = history.entry(job.source_id.clone()).or_default();
        ring.push_back(job);
        while ring.len() > JOB_HISTORY_DEPTH {
            ring.pop_front();
        }
    }
}

/// Resolves when the cancellation flag flips to true. If the sender is
/// replaced and dropped (a later cancellation cycle), this job was not
/// targeted and the future stays pending.
async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
