//! Scrape job records, outcomes, and per-job counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal outcome of a scrape job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum JobOutcome {
    Success,
    Failed { reason: String },
    #[serde(rename = "skipped-open-breaker")]
    SkippedBreakerOpen,
    SkippedDisabled,
}

impl JobOutcome {
    /// Reason string used when a job is cancelled (externally or by the
    /// per-job soft cap). Cancellation never counts as a breaker failure.
    pub const CANCELLED: &'static str = "cancelled";

    pub fn cancelled() -> Self {
        JobOutcome::Failed {
            reason: Self::CANCELLED.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Failed { reason } if reason == Self::CANCELLED)
    }
}

/// Per-job candidate accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    /// Candidates the adapter yielded.
    pub candidates: u64,
    /// Records admitted into the store (inserted or merged).
    pub admitted: u64,
    /// Candidates rejected on quality or content grounds.
    pub rejected: u64,
    /// Admitted records that merged into an existing store entry.
    pub duplicates: u64,
    /// Candidates dropped by normalization or link validation errors.
    pub validation_failures: u64,
}

/// Immutable record of one completed (or skipped) scrape job.
///
/// Jobs are created when dispatch begins and frozen at completion; the
/// orchestrator retains a bounded ring of recent jobs per source for the
/// status API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub source_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    pub counts: JobCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

impl ScrapeJob {
    /// Builds a skip record with zero counts.
    pub fn skipped(source_id: &str, outcome: JobOutcome) -> Self {
        let now = Utc::now();
        Self {
            source_id: source_id.to_string(),
            started_at: now,
            finished_at: now,
            outcome,
            counts: JobCounts::default(),
            first_error: None,
        }
    }
}

/// Summary of one `RunAllNow` bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub bundle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub jobs: Vec<ScrapeJob>,
}

impl RunSummary {
    /// Aggregate counts across every job in the bundle.
    pub fn totals(&self) -> JobCounts {
        let mut totals = JobCounts::default();
        for job in &self.jobs {
            totals.candidates += job.counts.candidates;
            totals.admitted += job.counts.admitted;
            totals.rejected += job.counts.rejected;
            totals.duplicates += job.counts.duplicates;
            totals.validation_failures += job.counts.validation_failures;
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization_uses_kebab_case() {
        let json = serde_json::to_value(&JobOutcome::SkippedBreakerOpen).unwrap();
        assert_eq!(json["outcome"], "skipped-open-breaker");

        let json = serde_json::to_value(&JobOutcome::SkippedDisabled).unwrap();
        assert_eq!(json["outcome"], "skipped-disabled");

        let json = serde_json::to_value(&JobOutcome::Failed {
            reason: "cancelled".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["reason"], "cancelled");
    }

    #[test]
    fn test_cancelled_helpers() {
        assert!(JobOutcome::cancelled().is_cancelled());
        assert!(!JobOutcome::Success.is_cancelled());
        assert!(!JobOutcome::Failed {
            reason: "network".to_string()
        }
        .is_cancelled());
    }

    #[test]
    fn test_run_summary_totals() {
        let mut job_a = ScrapeJob::skipped("a", JobOutcome::Success);
        job_a.counts.candidates = 3;
        job_a.counts.admitted = 2;
        let mut job_b = ScrapeJob::skipped("b", JobOutcome::Success);
        job_b.counts.candidates = 1;
        job_b.counts.rejected = 1;

        let summary = RunSummary {
            bundle_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            jobs: vec![job_a, job_b],
        };
        let totals = summary.totals();
        assert_eq!(totals.candidates, 4);
        assert_eq!(totals.admitted, 2);
        assert_eq!(totals.rejected, 1);
    }
}
