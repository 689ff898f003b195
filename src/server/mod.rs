//! HTTP façade: four JSON endpoints over the session's shared state.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::SendRequest;

use crate::mirror::SharedMirror;
use crate::session::{SessionHandles, SharedSocket};
use crate::store::SharedStore;
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub mirror: SharedMirror,
    pub store: SharedStore,
    pub socket: SharedSocket,
}

impl From<SessionHandles> for AppState {
    fn from(h: SessionHandles) -> Self {
        Self {
            mirror: h.mirror,
            store: h.store,
            socket: h.socket,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/messages", get(handlers::list_messages))
        .route("/api/groups", get(handlers::list_groups))
        .route("/api/messages/send", post(handlers::send_message))
        .route("/api/updates", get(handlers::get_updates))
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("reading listener address")?;
    tracing::info!(%addr, "server listening on http://{}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server exited")?;
    tracing::info!("http server stopped");
    Ok(())
}
