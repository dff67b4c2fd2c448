//! Settings model and loading.
//!
//! The source list lives in a JSON config file; scalar pipeline knobs may be
//! overridden through environment variables so deployments can tune them
//! without editing the file. The config path itself is vetted by
//! [`ConfigValidator::check_config_location`] before anything is read.

use crate::config::validation::ConfigValidator;
use crate::models::source::SourceSpec;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default user-agent rotation set. Browser-like strings, rotated per
/// request, because several upstream portals serve reduced markup to
/// obviously non-browser clients.
pub fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
    ]
}

/// Scalar pipeline knobs. Every field has an environment override listed in
/// [`apply_env_overrides`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Record store location. `memory://` selects the in-process store.
    pub store_uri: String,
    /// Admission threshold for the quality score (0..=100).
    pub min_quality_score: u8,
    /// Consecutive failures before a source's breaker opens.
    pub breaker_threshold: u64,
    /// Cool-down before an OPEN breaker permits a trial attempt.
    pub breaker_cooldown_ms: u64,
    /// Maximum concurrently executing scrape jobs.
    pub global_concurrency: usize,
    /// Total per-request timeout for outbound HTTP.
    pub http_timeout_ms: u64,
    /// Connect/read timeout for outbound HTTP.
    pub connect_timeout_ms: u64,
    /// Soft cap on a single scrape job; exceeding it cancels the job.
    pub job_timeout_ms: u64,
    /// Accept self-signed/invalid upstream certificates. Deliberate for
    /// ingest of heterogeneous public sites; a known, documented risk.
    pub accept_invalid_certs: bool,
    /// User-agent rotation set for outbound requests.
    pub user_agents: Vec<String>,
    /// Caller-facing limit on trigger endpoints (calls per hour per caller).
    pub trigger_limit_per_hour: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            store_uri: "memory://".to_string(),
            min_quality_score: 70,
            breaker_threshold: 3,
            breaker_cooldown_ms: 5 * 60 * 1000,
            global_concurrency: 3,
            http_timeout_ms: 30_000,
            connect_timeout_ms: 15_000,
            job_timeout_ms: 10 * 60 * 1000,
            accept_invalid_certs: true,
            user_agents: default_user_agents(),
            trigger_limit_per_hour: 10,
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub version: u8,
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Upper bound on the config file size. A source list plus pipeline knobs
/// fits in a few kilobytes; anything approaching this limit is not a
/// scholarpipe config.
pub const MAX_CONFIG_BYTES: u64 = 1024 * 1024;

/// Loads settings from the config file and applies environment overrides.
///
/// The file path comes from `SCHOLARPIPE_CONFIG_PATH` (default
/// `./config.json`) and must pass
/// [`ConfigValidator::check_config_location`]; the file itself is capped at
/// [`MAX_CONFIG_BYTES`].
///
/// # Environment overrides
///
/// `STORE_URI`, `MIN_QUALITY_SCORE`, `BREAKER_THRESHOLD`,
/// `BREAKER_COOLDOWN_MS`, `GLOBAL_CONCURRENCY`, `HTTP_TIMEOUT_MS`,
/// `JOB_TIMEOUT_MS`, `USER_AGENTS` (comma-separated).
pub fn load_settings() -> Result<Settings, Box<dyn std::error::Error>> {
    let configured =
        std::env::var("SCHOLARPIPE_CONFIG_PATH").unwrap_or_else(|_| "./config.json".to_string());

    debug!("Loading configuration from: {}", configured);

    let path = ConfigValidator::check_config_location(Path::new(&configured))
        .map_err(|e| format!("refusing config '{}': {}", configured, e))?;

    let raw = read_config_limited(&path)?;
    let mut settings: Settings = serde_json::from_str(&raw)
        .map_err(|e| format!("config '{}' is not valid JSON: {}", configured, e))?;

    apply_env_overrides(&mut settings.pipeline);

    debug!(
        "Loaded {} sources from {}",
        settings.sources.len(),
        path.display()
    );

    Ok(settings)
}

/// Reads the config file after a size check, so a mispointed path at some
/// huge file fails fast instead of being slurped into memory.
fn read_config_limited(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let metadata = fs::metadata(path)
        .map_err(|e| format!("cannot stat config '{}': {}", path.display(), e))?;
    if !metadata.is_file() {
        return Err(format!("config '{}' is not a regular file", path.display()).into());
    }
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(format!(
            "config '{}' is {} bytes; a source list should fit well under {} bytes",
            path.display(),
            metadata.len(),
            MAX_CONFIG_BYTES
        )
        .into());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("cannot read config '{}': {}", path.display(), e))?;
    Ok(raw)
}

/// Applies environment-variable overrides onto file-loaded pipeline settings.
///
/// Malformed values are ignored with a warning rather than failing startup;
/// the file value (or default) stays in effect.
pub fn apply_env_overrides(pipeline: &mut PipelineSettings) {
    if let Ok(uri) = std::env::var("STORE_URI") {
        if !uri.trim().is_empty() {
            pipeline.store_uri = uri;
        }
    }
    if let Some(v) = env_u64("MIN_QUALITY_SCORE") {
        if v <= 100 {
            pipeline.min_quality_score = v as u8;
        } else {
            warn!("MIN_QUALITY_SCORE={} out of range, keeping {}", v, pipeline.min_quality_score);
        }
    }
    if let Some(v) = env_u64("BREAKER_THRESHOLD") {
        pipeline.breaker_threshold = v;
    }
    if let Some(v) = env_u64("BREAKER_COOLDOWN_MS") {
        pipeline.breaker_cooldown_ms = v;
    }
    if let Some(v) = env_u64("GLOBAL_CONCURRENCY") {
        pipeline.global_concurrency = v as usize;
    }
    if let Some(v) = env_u64("HTTP_TIMEOUT_MS") {
        pipeline.http_timeout_ms = v;
    }
    if let Some(v) = env_u64("JOB_TIMEOUT_MS") {
        pipeline.job_timeout_ms = v;
    }
    if let Ok(agents) = std::env::var("USER_AGENTS") {
        let parsed: Vec<String> = agents
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !parsed.is_empty() {
            pipeline.user_agents = parsed;
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring non-numeric {}={}", name, raw);
                None
            }
        },
        Err(_) => None,
    }
}
