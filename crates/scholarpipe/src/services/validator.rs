//! Link validation: reachability, content analysis, and quality scoring.
//!
//! Given a candidate's title and application URL, the validator fetches the
//! page (through the rate-limited fetcher), analyzes the returned HTML, and
//! produces a 0..=100 quality score. Only records at or above the configured
//! threshold are admitted downstream.
//!
//! Scoring breakdown (saturating sum, clamped to 0..=100):
//!
//! - HTTP status: 30 for 200, 20 for any other status below 400, else 0
//! - +5 for https (after redirects)
//! - +5 for a response under 3000 ms
//! - +15 when the page is scholarship-relevant
//! - +10 when the candidate title appears on the page
//! - +10 when an application form or apply control is present
//! - content-quality sub-score scaled by 0.15
//! - accessibility signals: +3 viewport, +2 nav, +2 structured data,
//!   +2 alt-text majority, +1 headings

use crate::services::fetcher::{FetchResponse, Fetcher};
use crate::utils::text::{count_present, title_tokens, token_match_ratio};
use crate::utils::url::is_bare_root;
use futures::future::join_all;
use log::debug;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Concurrent validations per batch.
pub const DEFAULT_BATCH_SIZE: usize = 3;
/// Pause between successive batches.
pub const BATCH_PAUSE: Duration = Duration::from_secs(1);

/// Latency under which the speed bonus applies.
const FAST_RESPONSE: Duration = Duration::from_millis(3000);

/// Vocabulary whose presence marks a page as scholarship-related.
const SCHOLARSHIP_KEYWORDS: &[&str] = &[
    "scholarship",
    "fellowship",
    "grant",
    "bursary",
    "financial aid",
    "education funding",
    "student assistance",
    "academic award",
    "application form",
    "apply now",
    "eligibility",
    "criteria",
    "deadline",
    "submit",
    "register",
    "enrollment",
];

/// Markers of dead, expired, or placeholder pages.
const RED_FLAGS: &[&str] = &[
    "page not found",
    "404",
    "error",
    "expired",
    "closed",
    "maintenance",
    "temporarily unavailable",
    "access denied",
    "under construction",
    "coming soon",
    "invalid request",
];

const CONTACT_KEYWORDS: &[&str] = &["contact", "email", "phone", "helpline", "reach us"];

const DEADLINE_KEYWORDS: &[&str] = &[
    "deadline",
    "last date",
    "apply by",
    "closing date",
    "due date",
];

const APPLY_CONTROL_WORDS: &[&str] = &["apply", "register", "application"];

static FORM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("form").expect("BUG: hardcoded CSS selector 'form' is invalid"));
static ANCHOR_BUTTON_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a, button").expect("BUG: hardcoded CSS selector 'a, button' is invalid")
});
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("BUG: hardcoded CSS selector 'title' is invalid"));
static VIEWPORT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[name='viewport']")
        .expect("BUG: hardcoded CSS selector for viewport meta is invalid")
});
static NAV_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("nav, [role='navigation']")
        .expect("BUG: hardcoded CSS selector for navigation is invalid")
});
static STRUCTURED_DATA_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script[type='application/ld+json'], [itemscope]")
        .expect("BUG: hardcoded CSS selector for structured data is invalid")
});
static IMG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("BUG: hardcoded CSS selector 'img' is invalid"));
static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1, h2, h3").expect("BUG: hardcoded CSS selector for headings is invalid")
});

/// Content signals extracted from the fetched page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentAnalysis {
    /// Keyword count at least 3 with zero red flags.
    pub scholarship_relevant: bool,
    /// At least 60% of the candidate's title tokens appear on the page.
    pub title_matches: bool,
    pub has_application_form: bool,
    pub has_contact_info: bool,
    pub has_deadline_info: bool,
    pub keyword_matches: usize,
    pub red_flags: usize,
    pub body_length: usize,
}

/// Structural accessibility signals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessibilitySignals {
    /// Viewport meta tag present.
    pub mobile_compatible: bool,
    pub has_navigation: bool,
    pub has_structured_data: bool,
    /// More than half the images carry alt text.
    pub has_alt_text: bool,
    pub has_headings: bool,
}

/// Full validation verdict for one application link.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub accessible: bool,
    pub final_url: String,
    pub is_secure: bool,
    pub content: ContentAnalysis,
    pub accessibility: AccessibilitySignals,
    pub quality_score: u8,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Admission verdict against a threshold; exactly the threshold passes.
    pub fn is_valid(&self, min_quality: u8) -> bool {
        self.quality_score >= min_quality
    }

    fn rejected(url: &str, error: String) -> Self {
        Self {
            accessible: false,
            final_url: url.to_string(),
            is_secure: false,
            content: ContentAnalysis::default(),
            accessibility: AccessibilitySignals::default(),
            quality_score: 0,
            errors: vec![error],
            warnings: Vec::new(),
        }
    }
}

/// Validates application links and scores page quality.
#[derive(Debug)]
pub struct LinkValidator {
    fetcher: Arc<Fetcher>,
    min_quality: u8,
    batch_size: usize,
    batch_pause: Duration,
}

impl LinkValidator {
    pub fn new(fetcher: Arc<Fetcher>, min_quality: u8) -> Self {
        Self {
            fetcher,
            min_quality,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: BATCH_PAUSE,
        }
    }

    /// Overrides batching parameters; tests shrink the pause.
    pub fn with_batching(mut self, batch_size: usize, batch_pause: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.batch_pause = batch_pause;
        self
    }

    pub fn min_quality(&self) -> u8 {
        self.min_quality
    }

    /// Validates a single candidate link.
    ///
    /// Bare domain roots are rejected without network traffic: a landing
    /// page can never be a specific application link. Unreachable URLs
    /// produce an inaccessible result with score 0 rather than an error;
    /// quality rejection is a per-candidate concern, not a job failure.
    pub async fn validate(&self, title: &str, application_url: &str) -> ValidationResult {
        if is_bare_root(application_url) {
            debug!("Rejecting generic landing URL: {}", application_url);
            return ValidationResult::rejected(
                application_url,
                "Generic URL - requires specific application link".to_string(),
            );
        }

        let response = match self.fetcher.get(application_url).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Validation fetch failed for {}: {}", application_url, e);
                return ValidationResult::rejected(application_url, e.to_string());
            }
        };

        analyze(title, &response)
    }

    /// Validates a batch of `(title, application_url)` pairs with bounded
    /// parallelism, pausing between successive batches. Result order matches
    /// input order.
    pub async fn validate_batch(&self, items: &[(String, String)]) -> Vec<ValidationResult> {
        let mut results = Vec::with_capacity(items.len());
        let mut first = true;
        for chunk in items.chunks(self.batch_size) {
            if !first {
                sleep(self.batch_pause).await;
            }
            first = false;
            let chunk_results =
                join_all(chunk.iter().map(|(title, url)| self.validate(title, url))).await;
            results.extend(chunk_results);
        }
        results
    }
}

/// Scores a fetched page against the candidate title.
fn analyze(title: &str, response: &FetchResponse) -> ValidationResult {
    let is_secure = response.final_url.starts_with("https:");
    let document = Html::parse_document(&response.body);
    let page = PageSignals::extract(&document, response.body.len());

    let tokens = title_tokens(title, 3);
    let title_matches =
        !tokens.is_empty() && token_match_ratio(&tokens, &page.text_lower) >= 0.6;

    let keyword_matches = count_present(SCHOLARSHIP_KEYWORDS, &page.text_lower);
    let red_flags = count_present(RED_FLAGS, &page.text_lower);

    let content = ContentAnalysis {
        scholarship_relevant: keyword_matches >= 3 && red_flags == 0,
        title_matches,
        has_application_form: page.has_form || page.has_apply_control,
        has_contact_info: count_present(CONTACT_KEYWORDS, &page.text_lower) > 0,
        has_deadline_info: count_present(DEADLINE_KEYWORDS, &page.text_lower) > 0,
        keyword_matches,
        red_flags,
        body_length: page.body_length,
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    if response.status >= 400 {
        errors.push(format!("HTTP {}", response.status));
    }
    if !is_secure {
        warnings.push("Not served over HTTPS".to_string());
    }
    if response.elapsed >= FAST_RESPONSE {
        warnings.push(format!("Slow response: {} ms", response.elapsed.as_millis()));
    }
    if red_flags > 0 {
        warnings.push(format!("{} red-flag marker(s) on page", red_flags));
    }

    let quality_score = score(response, is_secure, &content, &page.accessibility);

    ValidationResult {
        accessible: true,
        final_url: response.final_url.clone(),
        is_secure,
        content,
        accessibility: page.accessibility,
        quality_score,
        errors,
        warnings,
    }
}

fn score(
    response: &FetchResponse,
    is_secure: bool,
    content: &ContentAnalysis,
    accessibility: &AccessibilitySignals,
) -> u8 {
    let mut score: i32 = 0;

    score += match response.status {
        200 => 30,
        s if s < 400 => 20,
        _ => 0,
    };
    if is_secure {
        score += 5;
    }
    if response.elapsed < FAST_RESPONSE {
        score += 5;
    }
    if content.scholarship_relevant {
        score += 15;
    }
    if content.title_matches {
        score += 10;
    }
    if content.has_application_form {
        score += 10;
    }
    score += (f64::from(content_quality(content)) * 0.15).round() as i32;

    if accessibility.mobile_compatible {
        score += 3;
    }
    if accessibility.has_navigation {
        score += 2;
    }
    if accessibility.has_structured_data {
        score += 2;
    }
    if accessibility.has_alt_text {
        score += 2;
    }
    if accessibility.has_headings {
        score += 1;
    }

    score.clamp(0, 100) as u8
}

/// Content-quality sub-score on its own 0..=100 scale.
fn content_quality(content: &ContentAnalysis) -> u8 {
    let mut sub: i32 = 0;
    if content.body_length > 500 {
        sub += 10;
    }
    if content.body_length > 1000 {
        sub += 10;
    }
    if content.keyword_matches >= 5 {
        sub += 20;
    } else if content.keyword_matches >= 3 {
        sub += 10;
    }
    if content.has_application_form {
        sub += 15;
    }
    if content.has_contact_info {
        sub += 10;
    }
    if content.has_deadline_info {
        sub += 10;
    }
    sub -= 15 * content.red_flags as i32;
    sub.clamp(0, 100) as u8
}

/// Raw signals pulled out of the parsed document in one pass.
struct PageSignals {
    text_lower: String,
    body_length: usize,
    has_form: bool,
    has_apply_control: bool,
    accessibility: AccessibilitySignals,
}

impl PageSignals {
    fn extract(document: &Html, body_length: usize) -> Self {
        let mut text = String::new();
        collect_visible_text(*document.root_element(), &mut text);
        if let Some(title_el) = document.select(&TITLE_SELECTOR).next() {
            for piece in title_el.text() {
                text.push(' ');
                text.push_str(piece);
            }
        }
        let text_lower = text.to_lowercase();

        let has_form = document.select(&FORM_SELECTOR).next().is_some();
        let has_apply_control = document.select(&ANCHOR_BUTTON_SELECTOR).any(|el| {
            let label = el.text().collect::<String>().to_lowercase();
            APPLY_CONTROL_WORDS.iter().any(|w| label.contains(w))
        });

        let (img_total, img_with_alt) =
            document
                .select(&IMG_SELECTOR)
                .fold((0usize, 0usize), |(total, with_alt), img| {
                    let has_alt = img
                        .value()
                        .attr("alt")
                        .map(|a| !a.trim().is_empty())
                        .unwrap_or(false);
                    (total + 1, with_alt + usize::from(has_alt))
                });

        let accessibility = AccessibilitySignals {
            mobile_compatible: document.select(&VIEWPORT_SELECTOR).next().is_some(),
            has_navigation: document.select(&NAV_SELECTOR).next().is_some(),
            has_structured_data: document.select(&STRUCTURED_DATA_SELECTOR).next().is_some(),
            has_alt_text: img_total > 0 && img_with_alt * 2 > img_total,
            has_headings: document.select(&HEADING_SELECTOR).next().is_some(),
        };

        Self {
            text_lower,
            body_length,
            has_form,
            has_apply_control,
            accessibility,
        }
    }
}

/// Walks the DOM collecting text nodes, skipping script/style/noscript so
/// inline JavaScript cannot trip keyword or red-flag matching.
fn collect_visible_text(node: ego_tree::NodeRef<'_, scraper::Node>, out: &mut String) {
    if let Some(element) = node.value().as_element() {
        let name = element.name();
        if name == "script" || name == "style" || name == "noscript" {
            return;
        }
    }
    if let Some(text) = node.value().as_text() {
        out.push_str(text);
        out.push(' ');
    }
    for child in node.children() {
        collect_visible_text(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn response(status: u16, final_url: &str, body: &str, elapsed_ms: u64) -> FetchResponse {
        FetchResponse {
            status,
            final_url: final_url.to_string(),
            headers: HeaderMap::new(),
            body: body.to_string(),
            elapsed: Duration::from_millis(elapsed_ms),
        }
    }

    fn rich_page() -> String {
        let filler = "Details about the scheme and its benefits. ".repeat(30);
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <title>State Merit Scholarship 2025</title>
  <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
  <nav><a href="/">Home</a></nav>
  <h1>State Merit Scholarship 2025</h1>
  <p>This scholarship is open to students meeting the eligibility criteria.
     Apply now before the deadline. Submit your application form online.</p>
  <p>{}</p>
  <p>Contact: helpline 1800-000-000, email office@example.gov.in</p>
  <p>Last date to apply: 31/12/2025</p>
  <form action="/apply" method="post"><input type="text" name="name"></form>
</body>
</html>"#,
            filler
        )
    }

    #[test]
    fn test_clean_scholarship_page_scores_high() {
        let resp = response(
            200,
            "https://example.gov.in/sms2025",
            &rich_page(),
            800,
        );
        let result = analyze("State Merit Scholarship 2025", &resp);

        assert!(result.accessible);
        assert!(result.is_secure);
        assert!(result.content.scholarship_relevant);
        assert!(result.content.title_matches);
        assert!(result.content.has_application_form);
        assert!(result.content.has_deadline_info);
        assert!(result.accessibility.mobile_compatible);
        assert!(
            result.quality_score >= 80,
            "expected >= 80, got {}",
            result.quality_score
        );
        assert!(result.is_valid(70));
    }

    #[test]
    fn test_not_found_page_scores_low() {
        let resp = response(
            404,
            "https://example.gov.in/notfound",
            "<html><body>Page not found</body></html>",
            200,
        );
        let result = analyze("State Merit Scholarship 2025", &resp);

        assert!(result.accessible);
        assert_eq!(result.content.red_flags >= 1, true);
        assert!(!result.content.scholarship_relevant);
        assert!(
            result.quality_score <= 20,
            "expected <= 20, got {}",
            result.quality_score
        );
        assert!(!result.is_valid(70));
        assert!(result.errors.iter().any(|e| e.contains("404")));
    }

    #[test]
    fn test_empty_body_is_not_relevant() {
        let resp = response(200, "https://example.gov.in/blank", "", 100);
        let result = analyze("State Merit Scholarship 2025", &resp);
        assert!(!result.content.scholarship_relevant);
        assert_eq!(result.content.keyword_matches, 0);
        assert!(!result.is_valid(70));
    }

    #[test]
    fn test_script_content_is_ignored() {
        let body = r#"<html><body>
            <script>console.error("error error error");</script>
            <p>scholarship eligibility deadline apply now criteria</p>
        </body></html>"#;
        let resp = response(200, "https://example.gov.in/x", body, 100);
        let result = analyze("ignored title here", &resp);
        assert_eq!(result.content.red_flags, 0);
        assert!(result.content.scholarship_relevant);
    }

    #[test]
    fn test_title_match_requires_sixty_percent() {
        let body = "<html><body><p>state merit page</p></body></html>";
        let resp = response(200, "https://example.gov.in/x", body, 100);
        // 2 of 3 long tokens present (state, merit but not scholarship)
        let result = analyze("State Merit Scholarship", &resp);
        assert!(result.content.title_matches); // 2/3 ≈ 0.67

        let result = analyze("National Overseas Scholarship Award", &resp);
        assert!(!result.content.title_matches);
    }

    #[test]
    fn test_redirect_scored_against_final_url() {
        let resp = response(200, "https://final.gov.in/apply", &rich_page(), 500);
        let result = analyze("State Merit Scholarship 2025", &resp);
        assert_eq!(result.final_url, "https://final.gov.in/apply");
        assert!(result.is_secure);
    }

    #[test]
    fn test_http_scheme_loses_security_points() {
        let page = rich_page();
        let https = analyze(
            "State Merit Scholarship 2025",
            &response(200, "https://example.gov.in/x", &page, 500),
        );
        let http = analyze(
            "State Merit Scholarship 2025",
            &response(200, "http://example.gov.in/x", &page, 500),
        );
        assert_eq!(https.quality_score - http.quality_score, 5);
        assert!(http.warnings.iter().any(|w| w.contains("HTTPS")));
    }

    #[test]
    fn test_content_quality_red_flags_subtract() {
        let content = ContentAnalysis {
            keyword_matches: 5,
            body_length: 2000,
            has_application_form: true,
            has_contact_info: true,
            has_deadline_info: true,
            red_flags: 0,
            ..ContentAnalysis::default()
        };
        assert_eq!(content_quality(&content), 75);

        let flagged = ContentAnalysis {
            red_flags: 2,
            ..content
        };
        assert_eq!(content_quality(&flagged), 45);
    }

    #[test]
    fn test_content_quality_clamps_to_zero() {
        let content = ContentAnalysis {
            red_flags: 11,
            ..ContentAnalysis::default()
        };
        assert_eq!(content_quality(&content), 0);
    }

    #[test]
    fn test_threshold_boundary() {
        let mut result = ValidationResult::rejected("https://x.gov.in/a", String::new());
        result.quality_score = 70;
        assert!(result.is_valid(70));
        result.quality_score = 69;
        assert!(!result.is_valid(70));
    }

    #[tokio::test]
    async fn test_generic_landing_rejected_without_fetch() {
        use crate::services::rate_limiter::{DomainPolicy, RateLimiter};
        use crate::services::fetcher::FetcherConfig;

        let limiter = Arc::new(RateLimiter::new(
            Duration::from_millis(1),
            DomainPolicy::new(1, 2),
        ));
        let fetcher = Arc::new(Fetcher::new(FetcherConfig::default(), limiter));
        let validator = LinkValidator::new(fetcher, 70);

        let result = validator
            .validate("Some Scholarship Title", "https://buddy4study.com/")
            .await;
        assert_eq!(result.quality_score, 0);
        assert!(!result.accessible);
        assert!(result.errors[0].contains("Generic URL"));
    }
}
