//! HTTP server lifecycle
//!
//! Binds the router and serves until the shutdown signal fires, then drains
//! in-flight connections.

use axum::Router;
use tracing::info;

use crate::shared::shutdown::ShutdownSignal;

/// Serve `app` on `port` until `shutdown` triggers.
pub async fn serve(
    app: Router,
    port: u16,
    shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "🅿️ API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.wait().await;
            info!("Draining in-flight requests");
        })
        .await
}
