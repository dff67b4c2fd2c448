//! Record normalization: field cleanup, URL resolution, deadline parsing,
//! and schema clamping.
//!
//! Normalization runs between the adapter and the link validator. It is
//! purely computational (no I/O) and rejects only records that are
//! structurally unusable; quality decisions belong to the validator and the
//! ingestion gate.

use crate::models::record::{
    CandidateRecord, Category, EducationLevel, TargetAudience, MIN_TITLE_LEN,
};
use crate::utils::text::collapse_whitespace;
use crate::utils::url::resolve_against;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use log::debug;

/// Days ahead used for the substituted deadline when the upstream value is
/// missing, unparsable, or already past.
pub const DEADLINE_SENTINEL_DAYS: i64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("title too short after cleanup: '{0}'")]
    TitleTooShort(String),
    #[error("application URL cannot be resolved to absolute http(s): '{0}'")]
    InvalidApplicationUrl(String),
}

/// A candidate after cleanup, ready for link validation.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub title: String,
    pub description: String,
    pub eligibility: String,
    pub amount: String,
    pub deadline: DateTime<Utc>,
    pub deadline_assumed: bool,
    pub application_url: String,
    pub source_url: String,
    pub provider: String,
    pub category: Category,
    pub target_audience: Vec<TargetAudience>,
    pub education_level: EducationLevel,
}

/// Stateless normalizer; construct once and share.
#[derive(Debug, Default, Clone)]
pub struct RecordNormalizer;

impl RecordNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Cleans and clamps a raw candidate.
    ///
    /// # Steps
    ///
    /// 1. Trim and collapse whitespace on every string field.
    /// 2. Resolve a relative `application_url` against the source base URL.
    /// 3. Parse the deadline; substitute the sentinel when unparsable/past.
    /// 4. Clamp category, audience, and education level to the schema.
    /// 5. Reject records missing title, application URL, or provider.
    pub fn normalize(
        &self,
        candidate: &CandidateRecord,
        base_url: &str,
        now: DateTime<Utc>,
    ) -> Result<NormalizedRecord, NormalizeError> {
        let title = collapse_whitespace(&candidate.title);
        if title.is_empty() {
            return Err(NormalizeError::MissingField("title"));
        }
        if title.chars().count() < MIN_TITLE_LEN {
            return Err(NormalizeError::TitleTooShort(title));
        }

        let provider = collapse_whitespace(&candidate.provider);
        if provider.is_empty() {
            return Err(NormalizeError::MissingField("provider"));
        }

        let raw_url = candidate.application_url.trim();
        if raw_url.is_empty() {
            return Err(NormalizeError::MissingField("application_url"));
        }
        let application_url = resolve_against(base_url, raw_url)
            .ok_or_else(|| NormalizeError::InvalidApplicationUrl(raw_url.to_string()))?;

        let source_url = {
            let raw = candidate.source_url.trim();
            if raw.is_empty() {
                base_url.to_string()
            } else {
                resolve_against(base_url, raw).unwrap_or_else(|| base_url.to_string())
            }
        };

        let (deadline, deadline_assumed) = parse_deadline(&candidate.deadline, now);
        if deadline_assumed {
            debug!(
                "Assuming deadline {} days out for '{}' (raw: '{}')",
                DEADLINE_SENTINEL_DAYS, title, candidate.deadline
            );
        }

        let mut target_audience: Vec<TargetAudience> = Vec::new();
        for raw in &candidate.target_audience {
            if let Some(audience) = TargetAudience::from_raw(raw) {
                if !target_audience.contains(&audience) {
                    target_audience.push(audience);
                }
            }
        }
        if target_audience.is_empty() {
            target_audience.push(TargetAudience::All);
        }

        Ok(NormalizedRecord {
            title,
            description: collapse_whitespace(&candidate.description),
            eligibility: collapse_whitespace(&candidate.eligibility),
            amount: collapse_whitespace(&candidate.amount),
            deadline,
            deadline_assumed,
            application_url,
            source_url,
            provider,
            category: Category::from_raw(&candidate.category),
            target_audience,
            education_level: EducationLevel::from_raw(&candidate.education_level),
        })
    }
}

/// Parses a free-text deadline.
///
/// Accepted formats: `dd/mm/yyyy`, `dd-mm-yyyy`, `yyyy-mm-dd`, and `mm/dd/yyyy`
/// as a fallback for the ambiguous slash form (day-first is assumed when both
/// readings are possible, matching the Indian sources these records come
/// from). A date of today still counts as a valid future deadline.
///
/// Returns the deadline as an end-of-day UTC timestamp plus a flag marking
/// whether the sentinel was substituted.
pub fn parse_deadline(raw: &str, now: DateTime<Utc>) -> (DateTime<Utc>, bool) {
    let cleaned = collapse_whitespace(raw);
    let sentinel = (now + ChronoDuration::days(DEADLINE_SENTINEL_DAYS), true);
    if cleaned.is_empty() {
        return sentinel;
    }

    let parsed = NaiveDate::parse_from_str(&cleaned, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(&cleaned, "%d-%m-%Y"))
        .or_else(|_| NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(&cleaned, "%m/%d/%Y"));

    match parsed {
        Ok(date) if date >= now.date_naive() => {
            let end_of_day = date
                .and_hms_opt(23, 59, 59)
                .expect("BUG: 23:59:59 is always a valid time of day");
            (DateTime::from_naive_utc_and_offset(end_of_day, Utc), false)
        }
        Ok(past) => {
            debug!("Deadline '{}' ({}) is in the past", cleaned, past);
            sentinel
        }
        Err(_) => sentinel,
    }
}
