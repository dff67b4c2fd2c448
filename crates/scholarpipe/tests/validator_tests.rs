//! End-to-end link validation against a local HTTP server.

use scholarpipe::services::fetcher::{Fetcher, FetcherConfig};
use scholarpipe::services::rate_limiter::{DomainPolicy, RateLimiter};
use scholarpipe::services::validator::LinkValidator;
use std::sync::Arc;
use std::time::Duration;

fn quick_validator() -> LinkValidator {
    let limiter = Arc::new(RateLimiter::new(
        Duration::from_millis(1),
        DomainPolicy::new(1, 4),
    ));
    let fetcher = Arc::new(Fetcher::new(
        FetcherConfig {
            max_attempts: 1,
            ..FetcherConfig::default()
        },
        limiter,
    ));
    LinkValidator::new(fetcher, 70).with_batching(3, Duration::from_millis(20))
}

fn scholarship_page() -> String {
    let filler = "Scheme details, benefits, disbursement schedule and documents. ".repeat(25);
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
  <p>Scholarship for students meeting the eligibility criteria. Apply now
     before the deadline and submit the application form online.</p>
  <p>{}</p>
  <p>Contact the helpline or email the office for queries.</p>
  <p>Last date to apply: 31/12/2025</p>
  <form action="/apply" method="post"><input name="applicant"></form>
</body>
</html>"#,
        filler
    )
}

#[tokio::test]
async fn test_clean_admit_scores_at_least_eighty() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/sms2025")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(scholarship_page())
        .create_async()
        .await;

    let validator = quick_validator();
    let result = validator
        .validate(
            "State Merit Scholarship 2025",
            &format!("{}/sms2025", server.url()),
        )
        .await;

    assert!(result.accessible);
    assert!(result.content.scholarship_relevant);
    assert!(result.content.title_matches);
    assert!(result.content.has_application_form);
    assert!(
        result.quality_score >= 80,
        "expected >= 80, got {}",
        result.quality_score
    );
    assert!(result.is_valid(70));
}

#[tokio::test]
async fn test_not_found_scores_at_most_twenty() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/notfound")
        .with_status(404)
        .with_body("Page not found")
        .create_async()
        .await;

    let validator = quick_validator();
    let result = validator
        .validate(
            "State Merit Scholarship 2025",
            &format!("{}/notfound", server.url()),
        )
        .await;

    assert!(
        result.quality_score <= 20,
        "expected <= 20, got {}",
        result.quality_score
    );
    assert!(!result.is_valid(70));
}

#[tokio::test]
async fn test_empty_body_with_200_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/blank")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let validator = quick_validator();
    let result = validator
        .validate("Any Scholarship Title Here", &format!("{}/blank", server.url()))
        .await;

    assert!(result.accessible);
    assert!(!result.content.scholarship_relevant);
    assert!(!result.is_valid(70));
}

#[tokio::test]
async fn test_redirect_lands_on_scholarship_page() {
    let mut server = mockito::Server::new_async().await;
    let target_url = format!("{}/final", server.url());
    server
        .mock("GET", "/moved")
        .with_status(301)
        .with_header("location", &target_url)
        .create_async()
        .await;
    server
        .mock("GET", "/final")
        .with_status(200)
        .with_body(scholarship_page())
        .create_async()
        .await;

    let validator = quick_validator();
    let result = validator
        .validate(
            "State Merit Scholarship 2025",
            &format!("{}/moved", server.url()),
        )
        .await;

    // Scored against the page the redirect landed on.
    assert!(result.final_url.ends_with("/final"));
    assert!(result.is_valid(70));
}

#[tokio::test]
async fn test_unreachable_host_is_inaccessible_not_fatal() {
    let validator = quick_validator();
    // Nothing listens on the discard port, so the connection is refused.
    let result = validator
        .validate(
            "Any Scholarship Title Here",
            "http://127.0.0.1:9/scholarship",
        )
        .await;
    assert!(!result.accessible);
    assert_eq!(result.quality_score, 0);
    assert!(!result.errors.is_empty());
}

#[tokio::test]
async fn test_batch_preserves_order_and_batches() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/good")
        .with_status(200)
        .with_body(scholarship_page())
        .expect_at_least(1)
        .create_async()
        .await;
    server
        .mock("GET", "/bad")
        .with_status(404)
        .with_body("Page not found")
        .expect_at_least(1)
        .create_async()
        .await;

    let validator = quick_validator();
    let items: Vec<(String, String)> = vec![
        (
            "State Merit Scholarship 2025".to_string(),
            format!("{}/good", server.url()),
        ),
        (
            "State Merit Scholarship 2025".to_string(),
            format!("{}/bad", server.url()),
        ),
        (
            "State Merit Scholarship 2025".to_string(),
            format!("{}/good", server.url()),
        ),
        (
            "State Merit Scholarship 2025".to_string(),
            format!("{}/bad", server.url()),
        ),
    ];

    let results = validator.validate_batch(&items).await;
    assert_eq!(results.len(), 4);
    assert!(results[0].is_valid(70));
    assert!(!results[1].is_valid(70));
    assert!(results[2].is_valid(70));
    assert!(!results[3].is_valid(70));
}

#[tokio::test]
async fn test_generic_aggregator_root_fast_rejected() {
    let validator = quick_validator();
    let result = validator
        .validate("Any Scholarship Title Here", "https://buddy4study.com/")
        .await;
    assert_eq!(result.quality_score, 0);
    assert!(result
        .errors
        .iter()
        .any(|e| e.contains("Generic URL")));
}
