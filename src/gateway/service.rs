//! The gateway service.
//!
//! Every read and write funnels through [`Gateway`]. Reads go through the
//! response cache and the in-flight table; writes invalidate their table
//! before returning. All calls are retried, audited once, and converted to an
//! [`OperationResult`] at this boundary.

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::future::FutureExt;
use serde_json::{json, Map, Value};
use tokio::time::Instant;

use crate::audit::{ActorResolver, AuditSink, AuditStore, AuditWorker, ClientContext};
use crate::config::{GatewayConfig, GatewaySettings, SharedSettings};
use crate::gateway::cache::{cache_key, CacheStats, Lookup, ResponseCache};
use crate::gateway::{GatewayError, OperationKind, OperationResult};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::security::{SecurityValidator, ThreatMonitor};
use crate::store::{DataStore, Filters, QueryOptions, StoreResult};

struct GatewayInner {
    store: Arc<dyn DataStore>,
    validator: Arc<SecurityValidator>,
    audit: AuditSink,
    actors: Arc<dyn ActorResolver>,
    cache: ResponseCache,
    settings: SharedSettings,
}

/// Data access gateway. Cheap to clone; clones share cache and settings.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    pub fn new(
        store: Arc<dyn DataStore>,
        validator: Arc<SecurityValidator>,
        audit: AuditSink,
        actors: Arc<dyn ActorResolver>,
        settings: SharedSettings,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                store,
                validator,
                audit,
                actors,
                cache: ResponseCache::new(),
                settings,
            }),
        }
    }

    /// Wire a gateway, its validator, threat monitor and audit sink from
    /// configuration. The returned worker must be spawned.
    pub fn from_config(
        config: &GatewayConfig,
        store: Arc<dyn DataStore>,
        audit_store: Arc<dyn AuditStore>,
        actors: Arc<dyn ActorResolver>,
        client: Arc<dyn ClientContext>,
    ) -> (Self, AuditWorker) {
        let (audit, worker) = AuditSink::new(config.audit.clone(), audit_store, actors.clone(), client);
        let settings: SharedSettings = Arc::new(ArcSwap::from_pointee(config.gateway.clone()));
        let monitor = Arc::new(ThreatMonitor::new(config.monitor.clone(), audit.clone()));
        let validator = Arc::new(SecurityValidator::new(
            settings.clone(),
            monitor,
            audit.clone(),
            config.security.column_policy.clone(),
        ));
        (Self::new(store, validator, audit, actors, settings), worker)
    }

    pub fn validator(&self) -> &Arc<SecurityValidator> {
        &self.inner.validator
    }

    pub fn monitor(&self) -> &Arc<ThreatMonitor> {
        self.inner.validator.monitor()
    }

    pub fn audit(&self) -> &AuditSink {
        &self.inner.audit
    }

    /// Current execution settings.
    pub fn settings(&self) -> Arc<GatewaySettings> {
        self.inner.settings.load_full()
    }

    /// Swap execution settings. Disabling the cache also empties it.
    pub fn apply_settings(&self, settings: GatewaySettings) {
        let cache_enabled = settings.cache_enabled;
        tracing::info!(
            timeout_ms = settings.timeout_ms,
            retries = settings.retries,
            cache_enabled,
            cache_ttl_ms = settings.cache_ttl_ms,
            max_result_size = settings.max_result_size,
            "Applying gateway settings"
        );
        self.inner.settings.store(Arc::new(settings));
        if !cache_enabled {
            self.inner.cache.clear();
        }
    }

    /// Filtered, ordered, paginated read.
    pub async fn select(&self, table: &str, options: &QueryOptions, use_cache: bool) -> OperationResult {
        let started = Instant::now();
        let outcome = self.read(table, options, use_cache).await;
        self.finish(OperationKind::Select, table, started, outcome).await
    }

    pub async fn insert(&self, table: &str, data: &Value) -> OperationResult {
        let started = Instant::now();
        let actor = self.actor_id().await;
        let data = self.inner.validator.sanitize(data, table, actor.as_deref()).await;

        let store = &self.inner.store;
        let payload = &data;
        let outcome = self
            .execute(OperationKind::Insert, table, move |_| store.insert(table, payload))
            .await;
        self.finish(OperationKind::Insert, table, started, outcome).await
    }

    pub async fn update(&self, table: &str, data: &Value, filters: &Filters) -> OperationResult {
        let started = Instant::now();
        let actor = self.actor_id().await;
        let data = self.inner.validator.sanitize(data, table, actor.as_deref()).await;
        let filters = self.sanitize_filters(filters, table, actor.as_deref()).await;

        let store = &self.inner.store;
        let (payload, filters) = (&data, &filters);
        let outcome = self
            .execute(OperationKind::Update, table, move |_| store.update(table, payload, filters))
            .await;
        self.finish(OperationKind::Update, table, started, outcome).await
    }

    pub async fn delete(&self, table: &str, filters: &Filters) -> OperationResult {
        let started = Instant::now();
        let actor = self.actor_id().await;
        let filters = self.sanitize_filters(filters, table, actor.as_deref()).await;

        let store = &self.inner.store;
        let filters = &filters;
        let outcome = self
            .execute(OperationKind::Delete, table, move |_| store.delete(table, filters))
            .await;
        self.finish(OperationKind::Delete, table, started, outcome).await
    }

    /// Drop cached entries and detach in-flight reads for `table`.
    pub fn invalidate_table(&self, table: &str) -> usize {
        let removed = self.inner.cache.invalidate_table(table);
        metrics::record_cache_event("invalidated");
        tracing::debug!(table, removed, "Cache invalidated");
        removed
    }

    pub fn clear_cache(&self) -> usize {
        let removed = self.inner.cache.clear();
        tracing::info!(removed, "Cache cleared");
        removed
    }

    pub fn purge_expired(&self) -> usize {
        self.inner.cache.purge_expired()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    async fn actor_id(&self) -> Option<String> {
        self.inner.actors.current_actor().await.map(|a| a.id)
    }

    async fn sanitize_filters(&self, filters: &Filters, context: &str, actor: Option<&str>) -> Filters {
        let as_object = Value::Object(filters.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Map<_, _>>());
        match self.inner.validator.sanitize(&as_object, context, actor).await {
            Value::Object(fields) => fields.into_iter().collect(),
            _ => filters.clone(),
        }
    }

    async fn read(&self, table: &str, options: &QueryOptions, use_cache: bool) -> Result<Value, GatewayError> {
        let settings = self.settings();
        let actor = self.actor_id().await;
        let mut options = options.clone();
        options.filters = self.sanitize_filters(&options.filters, table, actor.as_deref()).await;

        let key = cache_key(table, &options)?;
        let use_cache = use_cache && settings.cache_enabled;
        // A flight started by a bypass caller may still be joined by a
        // caching one, so the TTL follows the settings, not this caller.
        let ttl = settings.cache_enabled.then(|| settings.cache_ttl());
        let policy = RetryPolicy::from_settings(&settings);

        let inner = self.inner.clone();
        let owned_table = table.to_string();
        let lookup = self.inner.cache.lookup(&key, table, use_cache, move |ticket| {
            async move {
                let store = &inner.store;
                let validator = &inner.validator;
                let table = owned_table.as_str();
                let options = &options;
                let outcome = policy
                    .run(OperationKind::Select.as_str(), move |_| {
                        validator.validate_and_execute(store.select(table, options), OperationKind::Select, table)
                    })
                    .await;
                inner.cache.complete(&ticket, &outcome, ttl);
                outcome
            }
            .boxed()
        });

        match lookup {
            Lookup::Hit(data) => {
                tracing::debug!(table, "Cache hit");
                metrics::record_cache_event("hit");
                Ok(data)
            }
            Lookup::Joined(read) => {
                tracing::debug!(table, "Joined in-flight read");
                metrics::record_cache_event("coalesced");
                read.await
            }
            Lookup::Started(read) => {
                metrics::record_cache_event("miss");
                read.await
            }
        }
    }

    /// Run a write with retries, then invalidate its table whatever the
    /// outcome: a write that timed out may still have landed.
    async fn execute<F, Fut>(&self, kind: OperationKind, table: &str, mut call: F) -> Result<Value, GatewayError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = StoreResult<Value>>,
    {
        let policy = RetryPolicy::from_settings(&self.settings());
        let validator = &self.inner.validator;
        let outcome = policy
            .run(kind.as_str(), move |attempt| validator.validate_and_execute(call(attempt), kind, table))
            .await;
        self.invalidate_table(table);
        outcome
    }

    async fn finish(
        &self,
        kind: OperationKind,
        table: &str,
        started: Instant,
        outcome: Result<Value, GatewayError>,
    ) -> OperationResult {
        let elapsed = started.elapsed();
        let success = outcome.is_ok();
        if let Err(e) = &outcome {
            tracing::error!(operation = %kind, table, error = %e, "Operation failed");
        }
        metrics::record_operation(kind.as_str(), table, success, elapsed);

        let error = outcome.as_ref().err().map(ToString::to_string);
        self.inner
            .audit
            .log_user_action(
                kind.audit_action(),
                &format!("{} on {}", kind, table),
                "gateway",
                None,
                None,
                Some(json!({
                    "table": table,
                    "operation": kind.as_str(),
                    "duration_ms": elapsed.as_millis() as u64,
                    "success": success,
                    "error": error,
                })),
            )
            .await;

        OperationResult::from(outcome)
    }
}
