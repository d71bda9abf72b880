//! HTTP server for the bridge.

mod routes;

pub use routes::{router, MAX_BODY_BYTES};

use crate::bridge::Bridge;
use axum::http::HeaderValue;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Errors that can occur during server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("invalid CORS origin: {0}")]
    InvalidOrigin(String),

    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Browser origins allowed to call the API.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Builds the CORS layer for the configured origins.
    ///
    /// Credentials are allowed, so methods and headers mirror the request
    /// instead of using a wildcard.
    pub fn cors_layer(&self) -> Result<CorsLayer, ServerError> {
        let origins = self
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|_| ServerError::InvalidOrigin(origin.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true))
    }
}

/// Builds the full application: routes, CORS and request tracing.
pub fn app(bridge: Bridge, config: &ServerConfig) -> Result<Router, ServerError> {
    Ok(router(bridge)
        .layer(config.cors_layer()?)
        .layer(TraceLayer::new_for_http()))
}

/// HTTP server exposing the bridge.
pub struct BridgeServer {
    config: ServerConfig,
    bridge: Bridge,
}

impl BridgeServer {
    pub fn new(config: ServerConfig, bridge: Bridge) -> Self {
        Self { config, bridge }
    }

    /// Starts the HTTP server.
    ///
    /// Runs until SIGINT or SIGTERM, drains in-flight requests, then shuts
    /// the bridge down.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = app(self.bridge.clone(), &self.config)?;
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;

        tracing::info!(
            addr = %self.config.bind_addr(),
            "Bridge server listening"
        );

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Server(e.to_string()));

        self.bridge.shutdown().await;
        served
    }
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
