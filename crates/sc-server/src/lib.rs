//! sc-server: HTTP API for the stillcast pipeline.
//!
//! This crate wires the pipeline into a running server application. It
//! provides:
//!
//! - Axum-based HTTP API: upload, artifact download, upload limits, health,
//!   tool availability, and the OpenAPI document
//! - Structured JSON errors carrying the request id
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;

use sc_core::config::Config;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the stillcast server.
///
/// Discovers the external tools, prepares the storage directories, and
/// serves HTTP until a shutdown signal is received or `cancel` fires.
pub async fn start(config: Config, cancel: CancellationToken) -> sc_core::Result<()> {
    // Validate configuration.
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    // Discover external tools.
    let tools = sc_av::ToolRegistry::discover(&config.tools);
    for info in tools.check_all().await {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}; uploads will fail until it is installed", info.name);
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| sc_core::Error::Internal(format!("Invalid server address: {e}")))?;
    let static_dir = config.server.static_dir.clone();

    let ctx = AppContext::new(config, tools)?;
    tracing::info!(
        "Storing uploads in {} and outputs in {}",
        ctx.config.storage.upload_dir.display(),
        ctx.config.storage.output_dir.display()
    );

    let app = router::build_router(ctx, static_dir);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| sc_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Starting server on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .map_err(|e| sc_core::Error::Internal(format!("Server error: {e}")))?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sc_av::testing::FakeTools;
    use sc_core::config::StorageConfig;
    use tower::ServiceExt;

    fn test_app(dir: &std::path::Path, fake: &FakeTools) -> axum::Router {
        let config = Config {
            storage: StorageConfig {
                upload_dir: dir.join("uploads"),
                output_dir: dir.join("outputs"),
            },
            tools: fake.tools_config(),
            ..Config::default()
        };
        let ctx = AppContext::new(config, fake.registry()).unwrap();
        router::build_router(ctx, None)
    }

    #[tokio::test]
    async fn health_via_router() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeTools::working();
        let response = test_app(dir.path(), &fake)
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn client_request_id_is_echoed() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeTools::working();
        let response = test_app(dir.path(), &fake)
            .oneshot(
                Request::get("/api/artifacts/nope")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
    }

    #[tokio::test]
    async fn start_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeTools::working();
        let mut config = Config {
            storage: StorageConfig {
                upload_dir: dir.path().join("uploads"),
                output_dir: dir.path().join("outputs"),
            },
            tools: fake.tools_config(),
            ..Config::default()
        };
        config.server.host = "127.0.0.1".into();
        config.server.port = 0;

        let cancel = CancellationToken::new();
        let server = tokio::spawn(start(config, cancel.clone()));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        cancel.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
        assert!(dir.path().join("uploads").is_dir());
        assert!(dir.path().join("outputs").is_dir());
    }
}
