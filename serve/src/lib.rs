//! HTTP server for the orchestrator (axum): `POST /api/chat` streams the
//! pipeline's event bus back to the client as SSE (spec §6).
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod app;
mod chat;

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

pub use app::{router, AppState};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8787";

/// Runs the server on an existing listener. Used by tests (bind to
/// `127.0.0.1:0`, then pass the listener in). When `once` is true, `state`
/// should already carry a shutdown hook via
/// [`AppState::with_shutdown_on_first_request`]; the listener stops
/// accepting new connections once the first request is dispatched, while
/// letting that request's streaming response finish (graceful shutdown).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    once: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("chat server listening on http://{}", addr);

    if once {
        info!("will exit after first connection is dispatched (once mode, used by tests)");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let armed = Arc::new((*state).clone().with_shutdown_on_first_request(shutdown_tx));
        let app = router(armed);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await?;
        info!("connection dispatched, exiting (once mode)");
    } else {
        let app = router(state);
        axum::serve(listener, app).await?;
    }
    Ok(())
}

/// Runs the server. Listens on `addr` (default `0.0.0.0:8787`).
pub async fn run_serve(addr: Option<&str>, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_BIND_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, state, false).await
}
