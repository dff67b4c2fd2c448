//! URL classification and resolution helpers.
//!
//! The pipeline only ever admits absolute `http(s)` application links, and the
//! rate limiter keys its policies off hostnames, so these helpers centralize
//! the parsing rules instead of scattering `url::Url` calls around.

use url::Url;

/// Returns the parsed URL when `raw` is an absolute `http` or `https` URL.
///
/// Anything else (relative references, `ftp://`, `javascript:`, mailto links
/// scraped out of anchor tags) yields `None`.
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let parsed = Url::parse(raw).ok()?;
    match parsed.scheme() {
        "http" | "https" => Some(parsed),
        _ => None,
    }
}

/// Extracts the lowercase hostname of an absolute URL.
pub fn host_of(raw: &str) -> Option<String> {
    parse_http_url(raw).and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Resolves `candidate` against `base` when it is a relative reference.
///
/// Absolute `http(s)` URLs pass through untouched. Returns `None` when the
/// candidate cannot be made into an absolute `http(s)` URL at all.
pub fn resolve_against(base: &str, candidate: &str) -> Option<String> {
    if let Some(absolute) = parse_http_url(candidate) {
        return Some(absolute.to_string());
    }
    let base = parse_http_url(base)?;
    let joined = base.join(candidate).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}

/// True when the URL points at a bare domain root with no distinguishing path.
///
/// Links like `https://aggregator.example/` carry no scholarship-specific
/// information and are rejected before any network traffic is spent on them.
pub fn is_bare_root(raw: &str) -> bool {
    match parse_http_url(raw) {
        Some(u) => {
            (u.path().is_empty() || u.path() == "/") && u.query().is_none() && u.fragment().is_none()
        }
        None => false,
    }
}

/// Longest-suffix match of `host` against `suffix`.
///
/// `a.gov.in` matches suffix `gov.in`; `notgov.in` does not. A suffix equal to
/// the host also matches.
pub fn host_matches_suffix(host: &str, suffix: &str) -> bool {
    host == suffix || host.ends_with(&format!(".{}", suffix))
}
