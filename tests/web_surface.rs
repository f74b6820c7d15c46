//! Observation surface contract: endpoints, headers, method handling,
//! metric names, and the banned-connection accounting.

mod common;

use common::{TestClient, TestServer};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl HttpResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn http_request(addr: &str, method: &str, path: &str) -> anyhow::Result<HttpResponse> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut raw)).await??;
    let text = String::from_utf8_lossy(&raw).into_owned();

    let (head, body) = text
        .split_once("\r\n\r\n")
        .ok_or_else(|| anyhow::anyhow!("malformed response: {text:?}"))?;
    let mut lines = head.lines();
    let status_line = lines.next().unwrap_or_default();
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| anyhow::anyhow!("bad status line: {status_line:?}"))?;
    let headers = lines
        .filter_map(|line| {
            line.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect();
    Ok(HttpResponse {
        status,
        headers,
        body: body.to_string(),
    })
}

#[tokio::test]
async fn healthz_and_security_headers() {
    let server = TestServer::spawn(25600, 25601).await.unwrap();

    let response = http_request(&server.web_addr(), "GET", "/healthz")
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "OK\n");
    assert_eq!(response.header("X-Content-Type-Options"), Some("nosniff"));
    assert_eq!(response.header("X-Frame-Options"), Some("DENY"));
    assert_eq!(response.header("Cache-Control"), Some("no-store"));
}

#[tokio::test]
async fn unknown_path_is_404_with_headers() {
    let server = TestServer::spawn(25610, 25611).await.unwrap();

    let response = http_request(&server.web_addr(), "GET", "/nope")
        .await
        .unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.body, "Not found\n");
    assert_eq!(response.header("X-Content-Type-Options"), Some("nosniff"));
}

#[tokio::test]
async fn non_get_methods_are_405() {
    let server = TestServer::spawn(25620, 25621).await.unwrap();

    for method in ["POST", "PUT", "DELETE"] {
        let response = http_request(&server.web_addr(), method, "/healthz")
            .await
            .unwrap();
        assert_eq!(response.status, 405, "{method} should be rejected");
        assert_eq!(response.header("Allow"), Some("GET, HEAD"));
        assert_eq!(response.header("Cache-Control"), Some("no-store"));
    }
}

#[tokio::test]
async fn head_is_served_without_a_body() {
    let server = TestServer::spawn(25630, 25631).await.unwrap();

    let response = http_request(&server.web_addr(), "HEAD", "/healthz")
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn status_metrics_and_stats_reflect_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    let stats_file = dir.path().join("stats.json");
    let server = TestServer::spawn_with(
        25640,
        25641,
        &["--stats-file", stats_file.to_str().unwrap()],
    )
    .await
    .unwrap();

    let mut alice = server.connect().await.unwrap();
    alice.register("Alice").await.unwrap();
    alice.send_line("Mhello metrics").await.unwrap();
    alice.recv_line().await.unwrap();

    let status = http_request(&server.web_addr(), "GET", "/api/status")
        .await
        .unwrap();
    assert_eq!(status.status, 200);
    assert_eq!(status.header("Content-Type"), Some("application/json"));
    let snapshot: serde_json::Value = serde_json::from_str(&status.body).unwrap();
    assert_eq!(snapshot["player_count"], 1);
    assert_eq!(snapshot["players"][0]["nick"], "Alice");
    assert_eq!(snapshot["players"][0]["status"], "chat");
    assert_eq!(snapshot["counters"]["connections"], 1);
    assert_eq!(snapshot["counters"]["messages"], 1);

    let metrics = http_request(&server.web_addr(), "GET", "/metrics")
        .await
        .unwrap();
    assert_eq!(metrics.status, 200);
    assert!(
        metrics
            .header("Content-Type")
            .unwrap()
            .starts_with("text/plain")
    );
    for series in [
        "mortalnet_connections_total",
        "mortalnet_active_players",
        "mortalnet_messages_total",
        "mortalnet_challenges_total",
        "mortalnet_kicks_total",
        "mortalnet_bans_total",
        "mortalnet_uptime_seconds",
    ] {
        assert!(
            metrics.body.contains(&format!("# HELP {series}")),
            "missing HELP for {series}"
        );
        assert!(
            metrics.body.contains(&format!("# TYPE {series}")),
            "missing TYPE for {series}"
        );
    }
    assert!(metrics.body.contains("mortalnet_active_players 1"));
    assert!(metrics.body.contains("mortalnet_connections_total 1"));

    let stats = http_request(&server.web_addr(), "GET", "/api/stats")
        .await
        .unwrap();
    assert_eq!(stats.status, 200);
    let doc: serde_json::Value = serde_json::from_str(&stats.body).unwrap();
    assert_eq!(doc["players"]["Alice"]["connect_count"], 1);

    let dashboard = http_request(&server.web_addr(), "GET", "/").await.unwrap();
    assert_eq!(dashboard.status, 200);
    assert!(
        dashboard
            .header("Content-Type")
            .unwrap()
            .starts_with("text/html")
    );
    assert!(dashboard.body.contains("Alice"));
}

#[tokio::test]
async fn banned_connections_do_not_count() {
    let dir = tempfile::tempdir().unwrap();
    let ban_file = dir.path().join("bans.txt");
    std::fs::write(&ban_file, "127.0.0.2\n").unwrap();
    let server = TestServer::spawn_with(
        25650,
        25651,
        &["--ban-file", ban_file.to_str().unwrap()],
    )
    .await
    .unwrap();

    let mut alice = server.connect().await.unwrap();
    alice.register("Alice").await.unwrap();

    let mut banned = TestClient::connect_from("127.0.0.2", &server.chat_addr())
        .await
        .unwrap();
    assert_eq!(
        banned.recv_line().await.unwrap(),
        "SYou are banned from this server."
    );
    banned.expect_closed().await.unwrap();

    let metrics = http_request(&server.web_addr(), "GET", "/metrics")
        .await
        .unwrap();
    assert!(metrics.body.contains("mortalnet_connections_total 1"));
}
