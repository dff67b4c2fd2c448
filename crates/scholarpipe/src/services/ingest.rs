//! Ingestion gate: dedup, merge, and upsert of validated records.
//!
//! The gate is the last line before the store and enforces the admission
//! invariants: quality at or above the threshold, no placeholder markers in
//! any text field, and at most one stored record per upsert key. A record is
//! a duplicate when either the normalized (title, provider) pair or the
//! application URL matches an existing entry.

use crate::models::record::{LinkStatus, StoredRecord};
use crate::services::normalizer::NormalizedRecord;
use crate::services::store::{RecordStore, StoreError, UpsertOutcome};
use crate::services::validator::ValidationResult;
use chrono::{DateTime, Utc};
use log::{debug, error};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Whole-word markers that betray synthetic or template records. Adapters
/// must never synthesize data; this guard catches regressions loudly.
/// URLs are deliberately out of scope: hosts like `example.gov.in` are
/// legitimate upstream data.
static PLACEHOLDER_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(test|sample|mock|demo|example|placeholder|dummy|fake|template)\b")
        .expect("BUG: hardcoded placeholder marker pattern is invalid")
});

/// Why a candidate did not reach the store, or how it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// New record inserted.
    Inserted,
    /// Existing record merged and refreshed.
    Updated,
    /// Quality score below the admission threshold.
    RejectedQuality { score: u8 },
    /// A placeholder marker was found in the named field.
    RejectedPlaceholder { field: &'static str },
}

impl Admission {
    pub fn admitted(&self) -> bool {
        matches!(self, Admission::Inserted | Admission::Updated)
    }
}

/// Applies admission rules and writes to the record store.
#[derive(Debug)]
pub struct IngestionGate {
    store: Arc<dyn RecordStore>,
    min_quality: u8,
}

impl IngestionGate {
    pub fn new(store: Arc<dyn RecordStore>, min_quality: u8) -> Self {
        Self { store, min_quality }
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    /// Admits one validated, normalized record.
    ///
    /// Duplicate handling merges rather than replaces: description,
    /// eligibility, amount, and deadline only change when the incoming value
    /// is strictly more informative, while `last_validated`, `quality_score`,
    /// and `link_status` always refresh. The whole operation is idempotent
    /// per call.
    pub async fn admit(
        &self,
        record: NormalizedRecord,
        validation: &ValidationResult,
        source_id: &str,
        scraped_at: DateTime<Utc>,
    ) -> Result<Admission, StoreError> {
        if !validation.is_valid(self.min_quality) {
            debug!(
                "Rejecting '{}' on quality ({} < {})",
                record.title, validation.quality_score, self.min_quality
            );
            return Ok(Admission::RejectedQuality {
                score: validation.quality_score,
            });
        }

        if let Some(field) = placeholder_field(&record) {
            error!(
                "LIVE-DATA violation: placeholder marker in '{}' of record '{}' from source {}; rejecting",
                field, record.title, source_id
            );
            return Ok(Admission::RejectedPlaceholder { field });
        }

        let incoming = StoredRecord {
            title: record.title,
            description: record.description,
            eligibility: record.eligibility,
            amount: record.amount,
            deadline: record.deadline,
            deadline_assumed: record.deadline_assumed,
            application_url: record.application_url,
            source_url: record.source_url,
            provider: record.provider,
            category: record.category,
            target_audience: record.target_audience,
            education_level: record.education_level,
            is_active: true,
            link_status: LinkStatus::Verified,
            quality_score: validation.quality_score,
            last_validated: Utc::now(),
            scraped_at,
            source_id: source_id.to_string(),
        };

        let existing = match self
            .store
            .find_by_key(&incoming.title, &incoming.provider)
            .await?
        {
            Some(found) => Some(found),
            None => self.store.find_by_url(&incoming.application_url).await?,
        };

        match existing {
            Some(current) => {
                let merged = merge_into(&current, &incoming);
                self.store.upsert(merged).await?;
                Ok(Admission::Updated)
            }
            None => {
                // A racing insert for the same key surfaces as Updated here,
                // which the caller treats identically.
                match self.store.upsert(incoming).await? {
                    UpsertOutcome::Inserted => Ok(Admission::Inserted),
                    UpsertOutcome::Updated => Ok(Admission::Updated),
                }
            }
        }
    }
}

/// Returns the first text field containing a placeholder marker.
fn placeholder_field(record: &NormalizedRecord) -> Option<&'static str> {
    let checks: [(&'static str, &str); 5] = [
        ("title", &record.title),
        ("description", &record.description),
        ("eligibility", &record.eligibility),
        ("amount", &record.amount),
        ("provider", &record.provider),
    ];
    checks
        .iter()
        .find(|(_, value)| PLACEHOLDER_MARKERS.is_match(value))
        .map(|(field, _)| *field)
}

/// Merges an incoming record into the stored one.
///
/// Identity fields (title, provider, URLs, provenance) keep the stored
/// values; content fields update only when strictly more informative.
fn merge_into(current: &StoredRecord, incoming: &StoredRecord) -> StoredRecord {
    let mut merged = current.clone();

    if incoming.description.len() > current.description.len() {
        merged.description = incoming.description.clone();
    }
    if incoming.eligibility.len() > current.eligibility.len() {
        merged.eligibility = incoming.eligibility.clone();
    }
    if current.amount.is_empty() && !incoming.amount.is_empty() {
        merged.amount = incoming.amount.clone();
    }
    // A parsed deadline beats an assumed one.
    if current.deadline_assumed && !incoming.deadline_assumed {
        merged.deadline = incoming.deadline;
        merged.deadline_assumed = false;
    }

    merged.quality_score = incoming.quality_score;
    merged.last_validated = incoming.last_validated;
    merged.link_status = LinkStatus::Verified;

    merged
}
