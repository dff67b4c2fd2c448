//! Source declarations and scheduling metadata.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval for priority tier 1 sources (minutes).
pub const TIER_HIGH_INTERVAL_MIN: u64 = 30;
/// Default interval for priority tier 2 sources (minutes).
pub const TIER_STD_INTERVAL_MIN: u64 = 60;

/// A configured upstream source, declared at startup.
///
/// Sources are immutable at runtime except for the `enabled` flag, which
/// admin operations may flip. The scraping logic for a source lives in its
/// registered [`SourceAdapter`](crate::services::adapter::SourceAdapter); this
/// struct only carries identity and scheduling metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Stable identifier, used as the breaker key and in trigger URLs.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Priority tier: 1 = high (30 min default), 2 = standard (60 min default).
    pub priority: u8,
    /// Whether the scheduler dispatches jobs for this source.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-source interval override in minutes. Wins over the tier default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

impl SourceSpec {
    /// Effective scheduling interval: the per-source override when present,
    /// otherwise the tier default.
    pub fn effective_interval(&self) -> Duration {
        let minutes = self.interval_minutes.unwrap_or(match self.priority {
            1 => TIER_HIGH_INTERVAL_MIN,
            _ => TIER_STD_INTERVAL_MIN,
        });
        Duration::from_secs(minutes * 60)
    }

    /// Basic structural validation, called during config validation.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("source id must not be empty".to_string());
        }
        if self
            .id
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && c != '-' && c != '_')
        {
            return Err(format!(
                "source id '{}' may only contain alphanumerics, '-' and '_'",
                self.id
            ));
        }
        if self.name.trim().is_empty() {
            return Err(format!("source '{}' must have a display name", self.id));
        }
        if !(1..=2).contains(&self.priority) {
            return Err(format!(
                "source '{}' has priority {}, expected 1 or 2",
                self.id, self.priority
            ));
        }
        if let Some(0) = self.interval_minutes {
            return Err(format!(
                "source '{}' has a zero interval override",
                self.id
            ));
        }
        Ok(())
    }
}
