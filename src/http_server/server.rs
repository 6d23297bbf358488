use crate::config::ServerConfig;
use crate::core::ToolAggregator;
use crate::http_server::routes;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for route handlers
pub struct AppState {
    pub aggregator: Arc<ToolAggregator>,
}

pub struct HttpServer {
    config: ServerConfig,
    aggregator: Arc<ToolAggregator>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, aggregator: Arc<ToolAggregator>) -> Self {
        Self { config, aggregator }
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.create_router();

        let addr = SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        ));

        info!("Starting HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    pub fn create_router(&self) -> Router {
        let state = Arc::new(AppState {
            aggregator: self.aggregator.clone(),
        });

        Router::new()
            .route("/health", get(routes::health))
            .route("/stats", get(routes::stats))
            .route(
                "/mcp",
                post(routes::mcp_handler).delete(routes::delete_session),
            )
            .route("/compressions", post(routes::apply_compressions))
            .route("/compressions/pending", get(routes::pending_compressions))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}
