//! Logger configuration and output formatting.
//!
//! Pipeline logs are mostly read while tailing long scrape runs, so each
//! line leads with a UTC timestamp (job records and deadlines are UTC
//! everywhere else in the pipeline) followed by the emitting module with
//! the crate prefix stripped. Colors honor the `NO_COLOR` convention and
//! the filter comes from `LOG_LEVEL`.

use chrono::Utc;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::env;
use std::io::Write;

/// Maps a `LOG_LEVEL` value onto a filter. Unrecognized values fall back
/// to `Info` rather than failing startup.
fn level_from_str(raw: &str) -> LevelFilter {
    match raw.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Strips the crate prefix off a log target so pipeline modules read as
/// `services::orchestrator` instead of the full path. Targets from other
/// crates pass through untouched.
fn short_target(target: &str) -> &str {
    target.strip_prefix("scholarpipe::").unwrap_or(target)
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31m",
        Level::Warn => "\x1b[33m",
        Level::Info => "\x1b[32m",
        Level::Debug => "\x1b[36m",
        Level::Trace => "\x1b[90m",
    }
}

/// Configure and initialize the process-wide logger.
///
/// Output format:
///
/// ```text
/// 2025-03-15T10:30:45.123Z INFO  services::orchestrator > Dispatching job for source nsp
/// 2025-03-15T10:30:53.410Z WARN  services::circuit_breaker > Circuit breaker nsp opened due to failures
/// ```
///
/// # Environment
///
/// - `LOG_LEVEL`: trace | debug | info | warn | error | off (default info)
/// - `NO_COLOR`: disables ANSI colors
///
/// Call once during startup; a second call panics inside `env_logger`.
pub fn configure_logger() {
    let no_color = env::var("NO_COLOR").is_ok();
    let filter = level_from_str(&env::var("LOG_LEVEL").unwrap_or_default());

    Builder::new()
        .format(move |buf, record| {
            // Pad the plain level name to a fixed width before coloring so
            // escape codes never disturb the column.
            let level = format!("{:<5}", record.level());
            let (tint, reset) = if no_color {
                ("", "")
            } else {
                (level_color(record.level()), "\x1b[0m")
            };
            writeln!(
                buf,
                "{} {}{}{} {} > {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                tint,
                level,
                reset,
                short_target(record.target()),
                record.args(),
            )
        })
        .filter_level(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_str() {
        assert_eq!(level_from_str("trace"), LevelFilter::Trace);
        assert_eq!(level_from_str("debug"), LevelFilter::Debug);
        assert_eq!(level_from_str("WARN"), LevelFilter::Warn);
        assert_eq!(level_from_str("warning"), LevelFilter::Warn);
        assert_eq!(level_from_str("off"), LevelFilter::Off);
    }

    #[test]
    fn test_level_from_str_defaults_to_info() {
        assert_eq!(level_from_str(""), LevelFilter::Info);
        assert_eq!(level_from_str("verbose"), LevelFilter::Info);
        assert_eq!(level_from_str("  info  "), LevelFilter::Info);
    }

    #[test]
    fn test_short_target_strips_crate_prefix() {
        assert_eq!(
            short_target("scholarpipe::services::orchestrator"),
            "services::orchestrator"
        );
        assert_eq!(short_target("scholarpipe::routes::jobs"), "routes::jobs");
        assert_eq!(
            short_target("actix_web::middleware::logger"),
            "actix_web::middleware::logger"
        );
    }
}
