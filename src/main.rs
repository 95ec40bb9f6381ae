//! Data Access Gateway daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!     application code
//!           │ select / insert / update / delete
//!           ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                        GATEWAY                               │
//!   │  ┌────────────┐   ┌─────────────┐   ┌────────────────────┐   │
//!   │  │  response  │──▶│  in-flight  │──▶│ security validator │───┼──▶ data store
//!   │  │   cache    │   │   (single   │   │ sanitize, deadline │   │   (REST)
//!   │  │  (TTL)     │   │   flight)   │   │ cap, slow query    │   │
//!   │  └────────────┘   └─────────────┘   └─────────┬──────────┘   │
//!   │         retry with linear backoff             │              │
//!   │                                               ▼              │
//!   │  ┌────────────────┐                 ┌──────────────────┐     │
//!   │  │ threat monitor │────────────────▶│    audit sink    │─────┼──▶ audit table
//!   │  │ rate limiting  │                 │ (write-behind)   │     │
//!   │  └────────────────┘                 └──────────────────┘     │
//!   └──────────────────────────────────────────────────────────────┘
//!        admin API (axum)     metrics (Prometheus)     config hot reload
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use data_gateway::admin::{self, AdminState};
use data_gateway::audit::{StaticActor, StaticClientContext, StoreAuditWriter};
use data_gateway::config::{load_config, watcher::ConfigWatcher, GatewayConfig};
use data_gateway::gateway::Gateway;
use data_gateway::lifecycle::Shutdown;
use data_gateway::observability::{logging, metrics};
use data_gateway::store::{DataStore, RestStore};

const CONFIG_ENV: &str = "GATEWAY_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_tracing(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "data-gateway starting");
    tracing::info!(
        config = ?config_path,
        timeout_ms = config.gateway.timeout_ms,
        retries = config.gateway.retries,
        cache_enabled = config.gateway.cache_enabled,
        store = %config.store.base_url,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store: Arc<dyn DataStore> = Arc::new(RestStore::new(&config.store)?);
    let audit_store = Arc::new(StoreAuditWriter::new(store.clone(), &config.audit));
    let actors = Arc::new(StaticActor::from_config(&config.actor));
    let client = Arc::new(StaticClientContext::from_config(&config.actor));

    let shutdown = Shutdown::new();
    let (gateway, audit_worker) = Gateway::from_config(&config, store, audit_store, actors, client);

    let audit_handle = tokio::spawn(audit_worker.run(shutdown.subscribe()));
    let sweep_handle = tokio::spawn(gateway.monitor().clone().run(shutdown.subscribe()));

    let admin_handle = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let router = admin::setup_admin_router(AdminState::new(gateway.clone(), &config.admin.api_key));
        let rx = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, router, rx).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    // Keeps the notify watcher alive for the lifetime of the daemon.
    let _watcher = match &config_path {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let reload_gateway = gateway.clone();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    reload_gateway.apply_settings(new_config.gateway);
                }
            });
            match watcher.run() {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::error!(error = %e, "Config watcher failed to start, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.trigger();

    if let Some(handle) = admin_handle {
        let _ = handle.await;
    }
    let _ = sweep_handle.await;
    let _ = audit_handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
