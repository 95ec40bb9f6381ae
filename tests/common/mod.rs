//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use data_gateway::audit::{
    Actor, AuditError, AuditRecord, AuditSink, AuditStore, ClientMetadata, StaticActor,
    StaticClientContext,
};
use data_gateway::config::{AuditConfig, GatewayConfig};
use data_gateway::gateway::Gateway;
use data_gateway::lifecycle::Shutdown;
use data_gateway::store::{DataStore, Filters, MemoryStore, QueryOptions, StoreError, StoreResult};

/// Memory-backed store with call counters, failure injection and latency.
/// Filters of every select, update and delete are kept for inspection.
///
/// Reads take their snapshot before the delay, so a slow read returns the
/// state from when it started.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    selects: AtomicUsize,
    writes: AtomicUsize,
    fail_next: AtomicUsize,
    always_fail: AtomicBool,
    delay: Mutex<Duration>,
    seen_filters: Mutex<Vec<Filters>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.inner.seed(table, rows);
    }

    pub fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn fail_always(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    /// Filters received by the store, oldest first.
    pub fn seen_filters(&self) -> Vec<Filters> {
        self.seen_filters.lock().unwrap().clone()
    }

    fn observe(&self, filters: &Filters) {
        self.seen_filters.lock().unwrap().push(filters.clone());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    fn injected_failure(&self) -> StoreResult<()> {
        if self.always_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection refused".to_string()));
        }
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Status {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn latency(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DataStore for ScriptedStore {
    async fn select(&self, table: &str, query: &QueryOptions) -> StoreResult<Value> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.observe(&query.filters);
        let outcome = match self.injected_failure() {
            Ok(()) => self.inner.select(table, query).await,
            Err(e) => Err(e),
        };
        self.latency().await;
        outcome
    }

    async fn insert(&self, table: &str, data: &Value) -> StoreResult<Value> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;
        self.latency().await;
        self.inner.insert(table, data).await
    }

    async fn update(&self, table: &str, data: &Value, filters: &Filters) -> StoreResult<Value> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.observe(filters);
        self.injected_failure()?;
        self.latency().await;
        self.inner.update(table, data, filters).await
    }

    async fn delete(&self, table: &str, filters: &Filters) -> StoreResult<Value> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.observe(filters);
        self.injected_failure()?;
        self.latency().await;
        self.inner.delete(table, filters).await
    }
}

/// Audit store that keeps every flushed batch.
#[derive(Default)]
pub struct RecordingAuditStore {
    batches: Mutex<Vec<Vec<AuditRecord>>>,
}

impl RecordingAuditStore {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl AuditStore for RecordingAuditStore {
    async fn write_batch(&self, _actor: &Actor, records: &[AuditRecord]) -> Result<(), AuditError> {
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

pub fn test_actor() -> Actor {
    Actor {
        id: "staff-7".to_string(),
        organization_id: "C1".to_string(),
    }
}

pub fn client_context() -> StaticClientContext {
    StaticClientContext::new(ClientMetadata {
        source_address: Some("10.0.0.5".to_string()),
        client_agent: Some("portal-tests".to_string()),
    })
}

pub fn course_rows(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({ "id": i, "name": format!("Course {}", i), "college_id": "C1" }))
        .collect()
}

/// Audit sink over a recording store, worker already spawned.
pub fn audit_sink(config: AuditConfig) -> (AuditSink, Arc<RecordingAuditStore>, Shutdown) {
    let store = Arc::new(RecordingAuditStore::default());
    let (sink, worker) = AuditSink::new(
        config,
        store.clone(),
        Arc::new(StaticActor::new(Some(test_actor()))),
        Arc::new(client_context()),
    );
    let shutdown = Shutdown::new();
    tokio::spawn(worker.run(shutdown.subscribe()));
    (sink, store, shutdown)
}

/// A running gateway over a scripted store.
pub struct Harness {
    pub gateway: Gateway,
    pub store: Arc<ScriptedStore>,
    pub audit: Arc<RecordingAuditStore>,
    pub shutdown: Shutdown,
    pub worker: JoinHandle<()>,
}

impl Harness {
    pub fn start(config: GatewayConfig) -> Self {
        let store = Arc::new(ScriptedStore::new());
        let audit = Arc::new(RecordingAuditStore::default());
        let (gateway, worker) = Gateway::from_config(
            &config,
            store.clone(),
            audit.clone(),
            Arc::new(StaticActor::new(Some(test_actor()))),
            Arc::new(client_context()),
        );
        let shutdown = Shutdown::new();
        let worker = tokio::spawn(worker.run(shutdown.subscribe()));
        Self {
            gateway,
            store,
            audit,
            shutdown,
            worker,
        }
    }

    /// Flush pending audit records and return every record persisted so far.
    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        let _ = self.gateway.audit().flush().await;
        self.audit.records()
    }

    pub async fn records_with_action(&self, action_type: &str) -> Vec<AuditRecord> {
        self.audit_records()
            .await
            .into_iter()
            .filter(|r| r.action_type == action_type)
            .collect()
    }

    /// Security events recorded under `event`.
    pub async fn security_events(&self, event: &str) -> Vec<AuditRecord> {
        self.records_with_action("security_event")
            .await
            .into_iter()
            .filter(|r| r.new_values.as_ref().map(|v| v["event"] == event).unwrap_or(false))
            .collect()
    }
}

/// Defaults with a short cache TTL, suited to most gateway tests.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.gateway.cache_ttl_ms = 5_000;
    config
}
