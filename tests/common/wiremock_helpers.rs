use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fission::backend::{BackendDescriptor, PatternKind};
use fission::config::{AppConfig, HttpConfig};

/// HTTP settings for tests: short timeout, no backoff delay
pub fn test_http_config(max_attempts: u32) -> HttpConfig {
    HttpConfig {
        request_timeout_secs: 2,
        max_attempts,
        backoff_factor: 0.0,
        max_backoff_secs: 0,
        retry_status_codes: vec![500, 502, 503, 504],
    }
}

/// Embedded defaults with test HTTP settings and the given backends
pub fn test_app_config(servers: &[(&str, &MockServer, PatternKind)]) -> AppConfig {
    let mut config = AppConfig::embedded_default().expect("embedded config must parse");
    config.http = test_http_config(2);
    config.backends = servers
        .iter()
        .map(|(id, server, pattern)| fission::config::BackendConfig {
            id: id.to_string(),
            base_url: format!("{}/", server.uri()),
            pattern: *pattern,
        })
        .collect();
    config
}

/// Backend descriptor pointing at a mock server
pub fn backend_for(id: &str, server: &MockServer, pattern: PatternKind) -> BackendDescriptor {
    BackendDescriptor::new(id, format!("{}/", server.uri()), pattern)
}

/// Serves `html` for the lookup page of `ip`
pub async fn mock_backend_page(ip: &str, html: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/{}/", ip)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    server
}

/// Serves `html` for every path
pub async fn mock_catch_all_page(html: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    server
}

/// Delays every response past the test request timeout
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("delayed response")
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}

/// Returns `status_code` for every request
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}

/// Returns `status_code` for the first `failures` requests, then `html`
pub async fn mock_flaky_server(status_code: u16, failures: u64, html: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .up_to_n_times(failures)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()))
        .with_priority(2)
        .mount(&server)
        .await;

    server
}

/// Number of requests a mock server has received
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}
