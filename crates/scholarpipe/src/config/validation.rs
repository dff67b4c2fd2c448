//! Comprehensive configuration validation with detailed error reporting.
//!
//! Startup runs every check and reports all problems at once instead of
//! failing on the first; operators fix a config file in one pass.

use crate::config::settings::Settings;
use log::{info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Result of configuration validation containing errors, warnings, and
/// recommendations.
///
/// Errors prevent startup. Warnings and recommendations are logged and
/// otherwise ignored.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the configuration is valid (no errors)
    pub is_valid: bool,
    /// Critical errors that prevent configuration use
    pub errors: Vec<String>,
    /// Non-critical issues that should be addressed
    pub warnings: Vec<String>,
    /// Suggestions for improving configuration
    pub recommendations: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// Adds a critical error and marks validation as failed.
    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_recommendation(&mut self, recommendation: String) {
        self.recommendations.push(recommendation);
    }

    /// Logs warnings and recommendations at their respective levels.
    pub fn log_non_fatal(&self) {
        for w in &self.warnings {
            warn!("config warning: {}", w);
        }
        for r in &self.recommendations {
            info!("config recommendation: {}", r);
        }
    }
}

/// Validator over the full [`Settings`] tree.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Resolves a config path and confirms it stays inside the working
    /// directory, so a stray `SCHOLARPIPE_CONFIG_PATH` cannot point the
    /// service at arbitrary files on the host.
    ///
    /// Returns the resolved path on success.
    pub fn check_config_location(path: &Path) -> Result<PathBuf, String> {
        let resolved = path
            .canonicalize()
            .map_err(|e| format!("cannot resolve '{}': {}", path.display(), e))?;
        let workdir = std::env::current_dir()
            .map_err(|e| format!("cannot determine working directory: {}", e))?;
        if resolved.strip_prefix(&workdir).is_err() {
            return Err(format!(
                "'{}' resolves outside the working directory",
                path.display()
            ));
        }
        Ok(resolved)
    }
    /// Runs every structural and semantic check over the settings.
    ///
    /// # Checks
    ///
    /// - per-source structural validation (id charset, priority tier, name)
    /// - duplicate source identifiers
    /// - scalar knob ranges (quality threshold, concurrency, breaker)
    /// - operational warnings (tight intervals, relaxed TLS, single-digit
    ///   cool-downs)
    pub fn validate_comprehensive(settings: &Settings) -> ValidationResult {
        let mut result = ValidationResult::new();

        if settings.sources.is_empty() {
            result.add_warning("no sources configured; scheduler will idle".to_string());
        }

        let mut seen = HashSet::new();
        for source in &settings.sources {
            if let Err(e) = source.validate() {
                result.add_error(e);
            }
            if !seen.insert(source.id.to_lowercase()) {
                result.add_error(format!("duplicate source id '{}'", source.id));
            }
            if source.effective_interval().as_secs() < 5 * 60 {
                result.add_warning(format!(
                    "source '{}' interval below 5 minutes may hammer the upstream",
                    source.id
                ));
            }
        }

        let p = &settings.pipeline;
        if p.min_quality_score > 100 {
            result.add_error(format!(
                "min_quality_score {} exceeds the 0..=100 scale",
                p.min_quality_score
            ));
        }
        if p.global_concurrency == 0 {
            result.add_error("global_concurrency must be at least 1".to_string());
        }
        if p.breaker_threshold == 0 {
            result.add_error("breaker_threshold must be at least 1".to_string());
        } else if p.breaker_threshold == 1 {
            result.add_warning(
                "breaker_threshold of 1 opens the breaker on any single failure".to_string(),
            );
        }
        if p.breaker_cooldown_ms < 10_000 {
            result.add_warning(format!(
                "breaker cool-down of {} ms barely throttles a failing source",
                p.breaker_cooldown_ms
            ));
        }
        if p.user_agents.is_empty() {
            result.add_error("user_agents must contain at least one entry".to_string());
        }
        if p.http_timeout_ms < p.connect_timeout_ms {
            result.add_error(format!(
                "http_timeout_ms ({}) is below connect_timeout_ms ({})",
                p.http_timeout_ms, p.connect_timeout_ms
            ));
        }
        if p.accept_invalid_certs {
            result.add_warning(
                "TLS verification is relaxed for ingest; invalid upstream certificates are accepted"
                    .to_string(),
            );
        }
        if p.store_uri == "memory://" {
            result.add_recommendation(
                "memory:// store loses records on restart; point STORE_URI at a persistent store for production".to_string(),
            );
        }
        if !settings.sources.iter().any(|s| s.priority == 1) && !settings.sources.is_empty() {
            result.add_recommendation(
                "no tier-1 sources configured; everything runs on the slow schedule".to_string(),
            );
        }

        result
    }
}
