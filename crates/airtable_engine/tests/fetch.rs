use std::time::Duration;

use airtable_engine::{FailureKind, FetchError, FetchOutput, FetchSettings, PageFetcher, ReqwestFetcher};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Run the blocking fetcher off the async test runtime.
async fn fetch_blocking(
    settings: FetchSettings,
    url: String,
    headers: Vec<(String, String)>,
) -> Result<FetchOutput, FetchError> {
    tokio::task::spawn_blocking(move || {
        let url = Url::parse(&url).unwrap();
        ReqwestFetcher::new(settings).fetch(&url, &headers)
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn fetcher_returns_body_status_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app1/shr2"))
        .and(header("x-time-zone", "Europe/Oslo"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-id", "req42")
                .set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let url = format!("{}/app1/shr2", server.uri());
    let headers = vec![("x-time-zone".to_string(), "Europe/Oslo".to_string())];
    let output = fetch_blocking(FetchSettings::default(), url.clone(), headers)
        .await
        .expect("fetch ok");

    assert_eq!(output.status, 200);
    assert!(output.is_success());
    assert_eq!(output.metadata.original_url, url);
    assert_eq!(output.metadata.final_url, output.metadata.original_url);
    assert_eq!(output.metadata.redirect_count, 0);
    assert!(output
        .metadata
        .content_type
        .unwrap()
        .starts_with("text/html"));
    assert!(output
        .headers
        .iter()
        .any(|(name, value)| name == "x-request-id" && value == "req42"));
    assert_eq!(output.bytes, b"<html>ok</html>");
}

#[tokio::test(flavor = "multi_thread")]
async fn non_success_status_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let output = fetch_blocking(FetchSettings::default(), url, Vec::new())
        .await
        .expect("a 404 is still a response");
    assert_eq!(output.status, 404);
    assert!(!output.is_success());
}

#[tokio::test(flavor = "multi_thread")]
async fn fetcher_times_out_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Some(Duration::from_millis(50)),
        ..FetchSettings::default()
    };
    let url = format!("{}/slow", server.uri());
    let err = fetch_blocking(settings, url, Vec::new()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test(flavor = "multi_thread")]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let url = format!("{}/large", server.uri());
    let err = fetch_blocking(settings, url, Vec::new()).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn fetcher_stops_after_redirect_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        redirect_limit: 2,
        ..FetchSettings::default()
    };
    let url = format!("{}/loop", server.uri());
    let err = fetch_blocking(settings, url, Vec::new()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::RedirectLimitExceeded);
}

#[tokio::test(flavor = "multi_thread")]
async fn fetcher_follows_exactly_redirect_limit_hops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/b"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/c"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        redirect_limit: 2,
        ..FetchSettings::default()
    };
    let url = format!("{}/a", server.uri());
    let output = fetch_blocking(settings.clone(), url.clone(), Vec::new())
        .await
        .expect("two redirects fit a limit of two");
    assert_eq!(output.status, 200);
    assert_eq!(output.metadata.redirect_count, 2);
    assert!(output.metadata.final_url.ends_with("/c"));
    assert_eq!(output.bytes, b"landed");

    let settings = FetchSettings {
        redirect_limit: 1,
        ..settings
    };
    let err = fetch_blocking(settings, url, Vec::new()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::RedirectLimitExceeded);
}

#[test]
fn non_http_scheme_is_invalid() {
    let url = Url::parse("file:///etc/hosts").unwrap();
    let err = ReqwestFetcher::new(FetchSettings::default())
        .fetch(&url, &[])
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
