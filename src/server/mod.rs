//! Streaming relay service
//!
//! Exposes the agent over HTTP: each prompt becomes a push stream of
//! `data: <JSON>` frames.

pub mod context;
pub mod relay;
pub mod routes;

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::Result;

pub use context::{AppContext, HealthStatus};
pub use relay::{RelayEvent, classify, relay};
pub use routes::{PromptRequest, router};

/// Serve until `shutdown` resolves, then close connector sessions
pub async fn serve(listener: TcpListener, ctx: Arc<AppContext>, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(ctx.clone()))
        .with_graceful_shutdown(shutdown)
        .await?;

    ctx.shutdown().await;
    log::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Failed to listen for Ctrl-C: {}", e);
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
                log::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("Shutdown signal received");
}
