//! HTTP/WebSocket server for the observer bridge

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::UiConfig;
use crate::monitor::SoundLevelMonitor;
use crate::ui::handlers;
use crate::ui::websocket;

/// Shared application state
pub struct AppState {
    pub monitor: Arc<SoundLevelMonitor>,
}

impl AppState {
    pub fn new(monitor: Arc<SoundLevelMonitor>) -> Self {
        Self { monitor }
    }
}

/// Web server exposing the monitor to presentation layers
pub struct WebServer {
    config: UiConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server
    pub fn new(config: UiConfig, monitor: Arc<SoundLevelMonitor>) -> Self {
        Self {
            config,
            state: Arc::new(AppState::new(monitor)),
        }
    }

    /// Get shared state
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/api/status", get(handlers::get_status))
            .route("/api/devices", get(handlers::get_devices))
            .route("/api/start", post(handlers::start))
            .route("/api/stop", post(handlers::stop))
            .route("/api/permission", post(handlers::set_permission))
            .route("/ws", get(websocket::websocket_handler))
            .route("/health", get(|| async { "OK" }));

        let router = if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router.layer(cors)
        } else {
            router
        };

        router.with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn start(&self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.http_port)
            .parse()?;

        let router = self.build_router();

        tracing::info!("Web server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }

    /// Start the web server in the background
    pub fn start_background(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.start().await })
    }
}
