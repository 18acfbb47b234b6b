//! HTTP server binding.

use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

/// Bind the API to loopback and serve until `shutdown` resolves.
///
/// The bridge is a local tool driven by a browser on the same machine;
/// binding anything but loopback would expose start/stop control of disk
/// benchmarks to the network.
pub async fn serve(
    router: Router,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("bridge listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
