//! HTTP server implementation using Axum.

use crate::handler::{handle_dispatch, handle_health};
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use diwu_core::config::DispatchConfig;
use diwu_core::{DiwuConfig, Dispatcher, Manifest, ProcessRunner};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: DiwuConfig,
}

impl AppState {
    /// Dispatch through the project's JSON manifest with process workers.
    pub fn from_config(config: DiwuConfig) -> anyhow::Result<Self> {
        let manifest = Arc::new(Manifest::json_file(config.manifest_path()));
        let runner = ProcessRunner::new(config.runtime.clone(), config.worker_timeout)
            .with_working_dir(config.root.clone());
        let dispatcher = Dispatcher::new(&config.base_path, manifest, Arc::new(runner))?;
        Ok(Self { dispatcher, config })
    }
}

/// Build the router: `/health` plus the dispatch fallback.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Configure CORS for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .fallback(handle_dispatch)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(DispatchConfig::MAX_BODY_BYTES)),
        )
        .with_state(state)
}

/// Start the dev server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    info!("Serving {} under {}", state.config.root.display(), state.config.base_path);
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
