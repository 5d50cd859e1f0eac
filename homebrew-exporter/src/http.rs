//! HTTP server for the metrics endpoint and landing page.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::client::SourceClient;
use crate::collector::SharedCollector;

/// Content type of the metrics endpoint.
pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Application state shared across handlers.
struct AppState<C> {
    collector: SharedCollector<C>,
    landing_page: String,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            collector: self.collector.clone(),
            landing_page: self.landing_page.clone(),
        }
    }
}

/// Create the HTTP router.
fn create_router<C: SourceClient>(collector: SharedCollector<C>, metrics_path: &str) -> Router {
    let state = AppState {
        collector,
        landing_page: landing_page(metrics_path),
    };

    Router::new()
        .route("/", get(index_handler::<C>))
        .route(metrics_path, get(metrics_handler::<C>))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn landing_page(metrics_path: &str) -> String {
    format!(
        r#"<html>
<head><title>Homebrew Metrics Exporter</title></head>
<body>
<h1>Homebrew Exporter</h1>
<p><a href="{path}">Metrics</a></p>
</body>
</html>
"#,
        path = metrics_path
    )
}

/// Handler for the landing page.
async fn index_handler<C: SourceClient>(State(state): State<AppState<C>>) -> Html<String> {
    Html(state.landing_page)
}

/// Handler for the metrics endpoint.
///
/// Always answers 200: upstream failures only remove series from the body.
async fn metrics_handler<C: SourceClient>(State(state): State<AppState<C>>) -> Response {
    let body = state.collector.render().await;

    (
        StatusCode::OK,
        [("content-type", OPENMETRICS_CONTENT_TYPE)],
        body,
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer<C> {
    collector: SharedCollector<C>,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl<C: SourceClient> HttpServer<C> {
    /// Create a new HTTP server.
    pub fn new(
        collector: SharedCollector<C>,
        listen_addr: SocketAddr,
        metrics_path: String,
    ) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    ///
    /// Fails immediately if the listen address cannot be bound.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until the shutdown signal is
    /// received. The configured listen address is ignored.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let router = create_router(self.collector, &self.metrics_path);
        let addr = listener.local_addr().unwrap_or(self.listen_addr);

        info!(
            addr = %addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        // Run server with graceful shutdown
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
