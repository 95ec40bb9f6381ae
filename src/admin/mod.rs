//! Admin API.
//!
//! # Routes
//! - `GET  /admin/status` gateway settings, cache and threat overview
//! - `GET  /admin/cache` cache counters
//! - `POST /admin/cache/invalidate/{table}` drop a table's cache entries
//! - `GET  /admin/threats?limit=N` threat summary and most recent events
//! - `POST /admin/audit/flush` flush the pending audit batch now
//!
//! Every route requires `Authorization: Bearer <admin.api_key>` and is rate
//! limited per client address through the threat monitor.

pub mod auth;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;
use self::auth::{admin_auth_middleware, admin_rate_limit_middleware};
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub gateway: Gateway,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(gateway: Gateway, api_key: &str) -> Self {
        Self {
            gateway,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/cache", get(get_cache))
        .route("/admin/cache/invalidate/{table}", post(invalidate_table))
        .route("/admin/threats", get(get_threats))
        .route("/admin/audit/flush", post(flush_audit))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), admin_rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API on `listener` until shutdown is signalled.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!(address = ?listener.local_addr().ok(), "Admin API listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
        tracing::info!("Admin API shutting down");
    })
    .await
}
