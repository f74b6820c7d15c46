//! HTTP observation surface.
//!
//! Read-only: the HTML dashboard, the status snapshot, the persistent stats
//! document, Prometheus metrics, and a health probe. GET/HEAD only - other
//! methods get 405 with an `Allow` header. Every response carries the
//! no-sniff/no-frame/no-store headers. Handlers read the published snapshot
//! and never touch the hub's primary lock.

use crate::metrics;
use crate::state::Hub;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/", get(dashboard).fallback(method_not_allowed))
        .route("/api/status", get(api_status).fallback(method_not_allowed))
        .route("/api/stats", get(api_stats).fallback(method_not_allowed))
        .route("/metrics", get(metrics_text).fallback(method_not_allowed))
        .route("/healthz", get(healthz).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(middleware::from_fn(security_headers))
        .with_state(hub)
}

/// Serve the observation surface until the shutdown signal fires.
pub async fn serve(listener: TcpListener, hub: Arc<Hub>, mut shutdown: broadcast::Receiver<()>) {
    let app = router(hub);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await;
    match result {
        Ok(()) => info!("web surface stopped"),
        Err(e) => error!(error = %e, "web surface error"),
    }
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

async fn healthz() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "OK\n")
}

async fn api_status(State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    Json((*hub.snapshot()).clone())
}

async fn api_stats(State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    Json(hub.stats.to_json())
}

async fn metrics_text(State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    metrics::UPTIME_SECONDS.set(hub.started_at.elapsed().as_secs() as i64);
    (
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        metrics::gather_metrics(),
    )
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        "Not found\n",
    )
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET, HEAD")],
        "",
    )
}

async fn dashboard(State(hub): State<Arc<Hub>>) -> Html<String> {
    let snapshot = hub.snapshot();
    let rows: String = if snapshot.players.is_empty() {
        "<tr><td colspan=\"4\">No players online</td></tr>".to_string()
    } else {
        snapshot
            .players
            .iter()
            .map(|p| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    p.nick, p.ip, p.status, p.idle_seconds
                )
            })
            .collect()
    };
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="10">
<title>MortalNet Status</title>
<style>
  body {{ font-family: monospace; background: #111; color: #ccc; padding: 2em; }}
  h1 {{ color: #f80; }}
  table {{ border-collapse: collapse; width: 100%; }}
  th, td {{ border: 1px solid #444; padding: 0.4em 0.8em; text-align: left; }}
  th {{ color: #f80; background: #222; }}
  tr:nth-child(even) {{ background: #1a1a1a; }}
  .meta {{ color: #888; margin-bottom: 1em; }}
</style>
</head>
<body>
<h1>MortalNet Status</h1>
<p class="meta">Uptime: {uptime}s &mdash; Players online: {count}</p>
<table>
<tr><th>Nick</th><th>IP</th><th>Status</th><th>Idle (s)</th></tr>
{rows}
</table>
</body>
</html>
"#,
        uptime = snapshot.uptime_seconds,
        count = snapshot.player_count,
        rows = rows,
    ))
}
