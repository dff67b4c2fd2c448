//! Candidate and persisted record models plus the schema enums they clamp to.
//!
//! A [`CandidateRecord`] is the raw, transient output of a source adapter; it
//! is never persisted. After normalization and link validation it becomes a
//! [`StoredRecord`], the document shape the record store keeps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum accepted title length after whitespace normalization.
pub const MIN_TITLE_LEN: usize = 10;

/// Raw scholarship candidate produced by a source adapter.
///
/// Every string field is taken verbatim from the upstream page; the record
/// normalizer owns cleanup. `deadline` is free text in whatever format the
/// upstream site used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub eligibility: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub deadline: String,
    pub application_url: String,
    #[serde(default)]
    pub source_url: String,
    pub provider: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub target_audience: Vec<String>,
    #[serde(default)]
    pub education_level: String,
}

/// Scholarship category, clamped from free-form upstream text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Merit-based")]
    MeritBased,
    #[serde(rename = "Need-based")]
    NeedBased,
    Sports,
    Arts,
    Engineering,
    Medical,
    Research,
    Minority,
    Other,
}

impl Category {
    /// Maps upstream text onto the schema, defaulting to [`Category::Other`].
    pub fn from_raw(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "merit-based" | "merit based" | "merit" => Category::MeritBased,
            "need-based" | "need based" | "need" => Category::NeedBased,
            "sports" | "sport" => Category::Sports,
            "arts" | "art" => Category::Arts,
            "engineering" => Category::Engineering,
            "medical" | "medicine" => Category::Medical,
            "research" => Category::Research,
            "minority" => Category::Minority,
            _ => Category::Other,
        }
    }
}

/// Audience segment a scholarship targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetAudience {
    #[serde(rename = "SC/ST")]
    ScSt,
    #[serde(rename = "OBC")]
    Obc,
    General,
    Minority,
    Women,
    Disabled,
    All,
}

impl TargetAudience {
    /// Maps upstream text onto the schema. Unknown values yield `None` so the
    /// normalizer can fall back to `[All]` when nothing recognizable remains.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "sc/st" | "sc" | "st" | "sc-st" => Some(TargetAudience::ScSt),
            "obc" => Some(TargetAudience::Obc),
            "general" => Some(TargetAudience::General),
            "minority" | "minorities" => Some(TargetAudience::Minority),
            "women" | "girls" | "female" => Some(TargetAudience::Women),
            "disabled" | "pwd" | "divyang" => Some(TargetAudience::Disabled),
            "all" => Some(TargetAudience::All),
            _ => None,
        }
    }
}

/// Education level a scholarship applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EducationLevel {
    School,
    Undergraduate,
    Postgraduate,
    Doctoral,
    All,
}

impl EducationLevel {
    /// Maps upstream text onto the schema, defaulting to [`EducationLevel::All`].
    pub fn from_raw(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "school" | "class 10" | "class 12" | "secondary" => EducationLevel::School,
            "undergraduate" | "ug" | "bachelor" | "bachelors" => EducationLevel::Undergraduate,
            "postgraduate" | "pg" | "master" | "masters" => EducationLevel::Postgraduate,
            "doctoral" | "phd" | "doctorate" => EducationLevel::Doctoral,
            _ => EducationLevel::All,
        }
    }
}

/// Link verification status kept on each persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Verified,
    Pending,
    Broken,
}

/// The persisted document shape, one per validated scholarship.
///
/// Invariants maintained by the ingestion gate:
/// - `quality_score` is at or above the configured admission threshold
/// - `application_url` is an absolute `http(s)` URL
/// - `deadline` is always present; `deadline_assumed` marks substituted values
/// - `title` is at least [`MIN_TITLE_LEN`] characters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub title: String,
    pub description: String,
    pub eligibility: String,
    pub amount: String,
    pub deadline: DateTime<Utc>,
    /// True when the deadline could not be parsed (or was past) and the
    /// 60-days-out sentinel was substituted.
    pub deadline_assumed: bool,
    pub application_url: String,
    pub source_url: String,
    pub provider: String,
    pub category: Category,
    pub target_audience: Vec<TargetAudience>,
    pub education_level: EducationLevel,
    pub is_active: bool,
    pub link_status: LinkStatus,
    pub quality_score: u8,
    pub last_validated: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    /// Provenance: identifier of the source whose adapter produced the record.
    pub source_id: String,
}

impl StoredRecord {
    /// Normalized dedup key: lowercase collapsed title plus provider.
    pub fn dedup_key(&self) -> (String, String) {
        (
            self.title.trim().to_lowercase(),
            self.provider.trim().to_lowercase(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_raw() {
        assert_eq!(Category::from_raw("Merit-based"), Category::MeritBased);
        assert_eq!(Category::from_raw("merit based"), Category::MeritBased);
        assert_eq!(Category::from_raw("need"), Category::NeedBased);
        assert_eq!(Category::from_raw("Quantum Basket Weaving"), Category::Other);
        assert_eq!(Category::from_raw(""), Category::Other);
    }

    #[test]
    fn test_target_audience_from_raw() {
        assert_eq!(TargetAudience::from_raw("SC/ST"), Some(TargetAudience::ScSt));
        assert_eq!(TargetAudience::from_raw("girls"), Some(TargetAudience::Women));
        assert_eq!(TargetAudience::from_raw("unknown"), None);
    }

    #[test]
    fn test_education_level_from_raw() {
        assert_eq!(EducationLevel::from_raw("UG"), EducationLevel::Undergraduate);
        assert_eq!(EducationLevel::from_raw("PhD"), EducationLevel::Doctoral);
        assert_eq!(EducationLevel::from_raw("whatever"), EducationLevel::All);
    }

    #[test]
    fn test_serde_renames() {
        let json = serde_json::to_string(&Category::MeritBased).unwrap();
        assert_eq!(json, "\"Merit-based\"");
        let json = serde_json::to_string(&TargetAudience::ScSt).unwrap();
        assert_eq!(json, "\"SC/ST\"");
        let json = serde_json::to_string(&LinkStatus::Verified).unwrap();
        assert_eq!(json, "\"verified\"");
    }
}
