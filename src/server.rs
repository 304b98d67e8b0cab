//! HTTP server startup and graceful shutdown.

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::error::Result;

/// Bind `addr` and serve `app` until Ctrl-C.
pub async fn serve(app: Router, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!("listening on http://{local}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => tracing::error!("failed to listen for shutdown signal: {e}"),
    }
}
