//! Reverse-IP resolution against mock backends.

mod common;

use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;

use common::fixtures::load_fixture;
use common::wiremock_helpers::*;
use fission::backend::{BackendOrder, PatternKind};
use fission::http::FetchClient;
use fission::reverse_ip::ReverseIpResolver;
use fission::{CancelFlag, FissionError};

const IP: &str = "203.0.113.7";
const ATTEMPTS: usize = 3;

fn ip() -> Ipv4Addr {
    IP.parse().unwrap()
}

fn client(max_attempts: u32) -> FetchClient {
    FetchClient::from_config(&test_http_config(max_attempts)).unwrap()
}

#[tokio::test]
async fn test_falls_through_exhausted_backends() {
    let down_a = mock_error_server(503).await;
    let down_b = mock_error_server(503).await;
    let good = mock_backend_page("1.2.3.4", r#"<div id="J_domain"><p><a>foo.com</a></p></div>"#).await;

    let resolver = ReverseIpResolver::new(
        client(3),
        vec![
            backend_for("a", &down_a, PatternKind::UlList),
            backend_for("b", &down_b, PatternKind::UlList),
            backend_for("c", &good, PatternKind::DivDomain),
        ],
        ATTEMPTS,
    )
    .unwrap()
    .with_order(BackendOrder::InOrder);

    let result = resolver.resolve_ip("1.2.3.4".parse().unwrap()).await;

    assert_eq!(result.domains, vec!["foo.com"]);
    assert_eq!(result.attempts_used, 3);
    assert_eq!(result.backends_tried.len(), 3);
    assert_eq!(request_count(&down_a).await, 3);
    assert_eq!(request_count(&down_b).await, 3);
    assert_eq!(request_count(&good).await, 1);
}

#[tokio::test]
async fn test_random_order_still_finds_domains() {
    let down_a = mock_error_server(503).await;
    let down_b = mock_error_server(503).await;
    let good = mock_backend_page(IP, r#"<div id="J_domain"><p><a>foo.com</a></p></div>"#).await;

    let resolver = ReverseIpResolver::new(
        client(2),
        vec![
            backend_for("a", &down_a, PatternKind::UlList),
            backend_for("b", &down_b, PatternKind::UlList),
            backend_for("c", &good, PatternKind::DivDomain),
        ],
        ATTEMPTS,
    )
    .unwrap();

    let result = resolver.resolve_ip(ip()).await;

    assert_eq!(result.domains, vec!["foo.com"]);
    assert!(result.backends_tried.contains("c"));
    assert_eq!(result.backends_tried.len(), result.attempts_used);
    for server in [&down_a, &down_b] {
        let count = request_count(server).await;
        assert!(count == 0 || count == 2, "503 backend saw {} requests", count);
    }
}

#[tokio::test]
async fn test_stops_at_first_success() {
    let html = load_fixture("ul_list_page.html");
    let first = mock_backend_page(IP, &html).await;
    let second = mock_backend_page(IP, &html).await;

    let resolver = ReverseIpResolver::new(
        client(2),
        vec![
            backend_for("first", &first, PatternKind::UlList),
            backend_for("second", &second, PatternKind::UlList),
        ],
        ATTEMPTS,
    )
    .unwrap();

    let result = resolver.resolve_ip(ip()).await;

    assert_eq!(result.domains, vec!["alpha.example", "beta.example"]);
    assert_eq!(result.attempts_used, 1);
    assert_eq!(request_count(&first).await + request_count(&second).await, 1);
}

#[tokio::test]
async fn test_attempt_budget_and_no_backend_reuse() {
    let empty = load_fixture("empty_listing.html");
    let mut servers = Vec::new();
    for _ in 0..5 {
        servers.push(mock_catch_all_page(&empty).await);
    }
    let backends = servers
        .iter()
        .enumerate()
        .map(|(i, s)| backend_for(&format!("b{}", i), s, PatternKind::UlList))
        .collect();

    let resolver = ReverseIpResolver::new(client(1), backends, 3).unwrap();
    let result = resolver.resolve_ip(ip()).await;

    assert!(result.domains.is_empty());
    assert_eq!(result.attempts_used, 3);
    assert_eq!(result.backends_tried.len(), 3);

    let mut total = 0;
    for server in &servers {
        let count = request_count(server).await;
        assert!(count <= 1, "backend queried {} times", count);
        total += count;
    }
    assert_eq!(total, 3);
}

#[tokio::test]
async fn test_fewer_backends_than_attempts() {
    let down = mock_error_server(404).await;

    let resolver = ReverseIpResolver::new(
        client(1),
        vec![backend_for("only", &down, PatternKind::UlList)],
        ATTEMPTS,
    )
    .unwrap();

    let result = resolver.resolve_ip(ip()).await;

    assert!(result.domains.is_empty());
    assert_eq!(result.attempts_used, 1);
    assert_eq!(request_count(&down).await, 1);
}

#[tokio::test]
async fn test_unsupported_pattern_yields_nothing() {
    let page = mock_catch_all_page(&load_fixture("ul_list_page.html")).await;

    let resolver = ReverseIpResolver::new(
        client(1),
        vec![backend_for("odd", &page, PatternKind::Unsupported)],
        ATTEMPTS,
    )
    .unwrap();

    let result = resolver.resolve_ip(ip()).await;
    assert!(result.domains.is_empty());
    assert_eq!(result.attempts_used, 1);
}

#[tokio::test]
async fn test_empty_registry_rejected() {
    let err = ReverseIpResolver::new(client(1), Vec::new(), ATTEMPTS).unwrap_err();
    assert!(matches!(err, FissionError::NoBackends));
}

#[tokio::test]
async fn test_resolve_all_unions_domains() {
    let server = wiremock::MockServer::start().await;
    for (address, domain) in [("198.51.100.1", "one.example"), ("198.51.100.2", "two.example")] {
        wiremock::Mock::given(wiremock::matchers::path(format!("/{}/", address)))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(format!(
                r#"<ul id="list"><li><a>{}</a></li><li><a>shared.example</a></li></ul>"#,
                domain
            )))
            .mount(&server)
            .await;
    }

    let resolver = ReverseIpResolver::new(
        client(1),
        vec![backend_for("mock", &server, PatternKind::UlList)],
        ATTEMPTS,
    )
    .unwrap();

    let ips: BTreeSet<Ipv4Addr> = ["198.51.100.1", "198.51.100.2", "198.51.100.3"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();

    let sweep = resolver.resolve_all(&ips, 2, &CancelFlag::new()).await.unwrap();

    let expected: HashSet<String> = ["one.example", "two.example", "shared.example"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(sweep.domains, expected);
    assert_eq!(sweep.results.len(), 3);
    assert!(sweep.complete);
    assert_eq!(sweep.results.iter().filter(|r| r.domains.is_empty()).count(), 1);
}

#[tokio::test]
async fn test_resolve_all_zero_width() {
    let server = mock_error_server(500).await;
    let resolver = ReverseIpResolver::new(
        client(1),
        vec![backend_for("mock", &server, PatternKind::UlList)],
        ATTEMPTS,
    )
    .unwrap();

    let ips: BTreeSet<Ipv4Addr> = [ip()].into_iter().collect();
    let err = resolver.resolve_all(&ips, 0, &CancelFlag::new()).await.unwrap_err();

    assert!(matches!(err, FissionError::InvalidPoolWidth { pool: "request" }));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_resolve_all_cancelled_before_start() {
    let server = mock_catch_all_page(&load_fixture("ul_list_page.html")).await;
    let resolver = ReverseIpResolver::new(
        client(1),
        vec![backend_for("mock", &server, PatternKind::UlList)],
        ATTEMPTS,
    )
    .unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();
    let ips: BTreeSet<Ipv4Addr> = [ip()].into_iter().collect();
    let sweep = resolver.resolve_all(&ips, 4, &cancel).await.unwrap();

    assert!(!sweep.complete);
    assert!(sweep.domains.is_empty());
    assert_eq!(request_count(&server).await, 0);
}
