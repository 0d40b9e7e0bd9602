use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use forgepipe_orchestrator::Orchestrator;

use crate::routes;
use crate::state::{AppState, SharedState};

/// Where the Control API binds and how it's reached.
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8420,
        }
    }
}

#[must_use]
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state: SharedState = Arc::new(AppState { orchestrator });
    routes::router().with_state(state).layer(TraceLayer::new_for_http())
}

/// Bind and serve the Control API until the process receives a shutdown
/// signal. Returns once the listener is closed.
pub async fn serve(config: ApiConfig, orchestrator: Arc<Orchestrator>) -> std::io::Result<()> {
    let app = build_router(orchestrator);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(target: "forgepipe::api", %addr, "control api listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!(target: "forgepipe::api", "control api shutting down");
}
