//! Integration tests for the Homebrew exporter.
//!
//! A wiremock server stands in for formulae.brew.sh; the real HTTP client,
//! pipeline, collector and server are exercised against it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use homebrew_exporter::{
    FailureReason, HomebrewCollector, HttpServer, HttpSourceClient, ScrapePipeline,
    SharedCollector, SourceRegistry,
};
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INSTALL_30D: &str = r#"{
    "category": "install",
    "total_items": 2,
    "start_date": "2024-01-01",
    "end_date": "2024-01-30",
    "total_count": 13344,
    "items": [
        { "number": 1, "formula": "wget", "count": "12,345", "percent": "92.51" },
        { "number": 2, "formula": "jq", "count": "999", "percent": "7.49" }
    ]
}"#;

const OTHER: &str = r#"{
    "category": "other",
    "total_items": 2,
    "start_date": "2023-02-01",
    "end_date": "2024-01-31",
    "total_count": 3000,
    "items": [
        { "number": 1, "formula": "curl", "count": "2,000", "percent": "66.67" },
        { "number": 2, "formula": "wget", "count": "1,000", "percent": "33.33" }
    ]
}"#;

const DOCUMENTS: [&str; 9] = [
    "install/30d.json",
    "install/90d.json",
    "install/365d.json",
    "install-on-request/30d.json",
    "install-on-request/90d.json",
    "install-on-request/365d.json",
    "build-error/30d.json",
    "build-error/90d.json",
    "build-error/365d.json",
];

/// 2024-01-30T00:00:00Z and 2024-01-31T00:00:00Z.
const END_30D: i64 = 1_706_572_800;
const END_OTHER: i64 = 1_706_659_200;

/// Mount `response` for one document.
async fn mount(server: &MockServer, document: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/api/analytics/{}", document)))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mount INSTALL_30D for install/30d and OTHER for every other document,
/// except those listed in `skip`.
async fn mount_all(server: &MockServer, skip: &[&str]) {
    for document in DOCUMENTS.iter().filter(|d| !skip.contains(*d)) {
        let body = if *document == "install/30d.json" {
            INSTALL_30D
        } else {
            OTHER
        };
        mount(
            server,
            document,
            ResponseTemplate::new(200).set_body_string(body),
        )
        .await;
    }
}

fn create_collector(
    server: &MockServer,
    formulae: &[&str],
    request_timeout: Duration,
) -> SharedCollector {
    let client = HttpSourceClient::new(request_timeout).expect("client");
    let registry = SourceRegistry::new(&format!("{}/api/analytics", server.uri()));
    let pipeline = ScrapePipeline::new(client, registry, Duration::from_secs(10));
    Arc::new(HomebrewCollector::new(
        pipeline,
        formulae.iter().map(|s| s.to_string()).collect(),
    ))
}

#[tokio::test]
async fn test_tracked_formula_scenario() {
    let server = MockServer::start().await;
    mount_all(&server, &[]).await;

    let collector = create_collector(&server, &["wget", "curl"], Duration::from_secs(5));
    let samples = collector.collect().await;

    let install_30d: Vec<_> = samples
        .iter()
        .filter(|s| s.descriptor.name == "homebrew_install_30d")
        .collect();
    assert_eq!(install_30d.len(), 1, "jq is untracked, curl is absent");
    assert_eq!(install_30d[0].formula, "wget");
    assert_eq!(install_30d[0].value, 12345.0);
    assert_eq!(install_30d[0].timestamp.timestamp(), END_30D);

    // The eight other documents each contain both tracked formulae.
    assert_eq!(samples.len(), 1 + 8 * 2);
    for sample in &samples {
        assert!(sample.formula == "wget" || sample.formula == "curl");
    }
}

#[tokio::test]
async fn test_render_uses_document_timestamps() {
    let server = MockServer::start().await;
    mount_all(&server, &[]).await;

    let collector = create_collector(&server, &["wget", "curl"], Duration::from_secs(5));
    let output = collector.render().await;

    assert!(output.contains(&format!(
        "homebrew_install_30d{{formula=\"wget\"}} 12345 {}",
        END_30D
    )));
    assert!(output.contains(&format!(
        "homebrew_build_error_365d{{formula=\"curl\"}} 2000 {}",
        END_OTHER
    )));
    assert!(output.contains(&format!(
        "homebrew_install_on_request_90d{{formula=\"wget\"}} 1000 {}",
        END_OTHER
    )));
}

#[tokio::test]
async fn test_partial_failure_isolated() {
    let server = MockServer::start().await;
    mount_all(&server, &["install/90d.json", "build-error/30d.json"]).await;
    mount(
        &server,
        "install/90d.json",
        ResponseTemplate::new(500).set_body_string("internal error"),
    )
    .await;
    mount(
        &server,
        "build-error/30d.json",
        ResponseTemplate::new(200)
            .set_body_string(r#"{ "end_date": "not-a-date", "items": [] }"#),
    )
    .await;

    let collector = create_collector(&server, &["wget"], Duration::from_secs(5));
    let samples = collector.collect().await;

    // Seven healthy sources, one wget sample each.
    assert_eq!(samples.len(), 7);
    assert!(
        samples
            .iter()
            .all(|s| s.descriptor.name != "homebrew_install_90d"
                && s.descriptor.name != "homebrew_build_error_30d")
    );

    let stats = collector.stats();
    assert_eq!(
        stats.source_errors("homebrew_install_90d", FailureReason::Transport),
        1
    );
    assert_eq!(
        stats.source_errors("homebrew_build_error_30d", FailureReason::Parse),
        1
    );
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let server = MockServer::start().await;
    mount_all(&server, &["install-on-request/365d.json"]).await;
    mount(
        &server,
        "install-on-request/365d.json",
        ResponseTemplate::new(200)
            .set_body_string(OTHER)
            .set_delay(Duration::from_secs(5)),
    )
    .await;

    let collector = create_collector(&server, &["curl"], Duration::from_millis(500));
    let samples = collector.collect().await;

    // install/30d has no curl; seven others do; the slow one is dropped.
    assert_eq!(samples.len(), 7);
    assert_eq!(
        collector
            .stats()
            .source_errors("homebrew_install_on_request_365d", FailureReason::Transport),
        1
    );
}

#[tokio::test]
async fn test_scrapes_are_idempotent() {
    let server = MockServer::start().await;
    mount_all(&server, &[]).await;

    let collector = create_collector(&server, &["wget", "curl"], Duration::from_secs(5));

    let first = collector.collect().await;
    let second = collector.collect().await;
    assert_eq!(first, second);

    // Every scrape re-fetches every document.
    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 18);
}

#[tokio::test]
async fn test_http_server_metrics_endpoint() {
    let upstream = MockServer::start().await;
    mount_all(&upstream, &[]).await;

    let collector = create_collector(&upstream, &["wget"], Duration::from_secs(5));

    // Keep the listener so the port cannot be taken between bind and serve
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let actual_addr: SocketAddr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = HttpServer::new(collector, actual_addr, "/metrics".to_string());
    let server_handle = tokio::spawn(server.serve(listener, shutdown_rx));

    let client = reqwest::Client::new();
    let metrics = client
        .get(format!("http://{}/metrics", actual_addr))
        .send()
        .await
        .expect("metrics request failed");
    assert!(metrics.status().is_success());
    let body = metrics.text().await.unwrap();
    assert!(body.contains("homebrew_install_30d{formula=\"wget\"} 12345"));
    assert!(body.ends_with("# EOF\n"));

    let landing = client
        .get(format!("http://{}/", actual_addr))
        .send()
        .await
        .expect("landing page request failed");
    assert!(landing.status().is_success());
    let page = landing.text().await.unwrap();
    assert!(page.contains("href=\"/metrics\""));

    drop(client);
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server_handle)
        .await
        .expect("server did not shut down")
        .unwrap()
        .unwrap();
}
