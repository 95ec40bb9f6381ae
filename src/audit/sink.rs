//! Write-behind audit batching.
//!
//! # Responsibilities
//! - Accept records from any task without blocking on persistence
//! - Flush when the batch reaches `batch_size` or `batch_timeout` after the
//!   first queued record, whichever comes first
//! - Report every flush outcome through logs and metrics
//!
//! # Design Decisions
//! - `AuditSink` is a cheap cloneable handle; `AuditWorker` owns the batch
//! - A failed flush drops its batch (no requeue); the failure is counted in
//!   `audit_flushes_total{outcome="failed"}` and `audit_records_dropped_total`
//! - A flush without a resolvable actor is skipped, keeps the batch and
//!   re-arms the timer; the batch is capped at `max_pending`, oldest first
//! - On shutdown the worker drains the channel and flushes once more;
//!   records still without an actor at that point are dropped and counted

use std::collections::VecDeque;
use std::future::pending;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

use crate::audit::context::{ActorResolver, ClientContext};
use crate::audit::persist::AuditStore;
use crate::audit::record::AuditRecord;
use crate::audit::AuditError;
use crate::config::AuditConfig;
use crate::observability::metrics;
use crate::security::threat::Severity;

/// Outcome of one flush: the number of records persisted.
pub type FlushResult = Result<usize, AuditError>;

enum SinkCommand {
    Record(AuditRecord),
    Flush(oneshot::Sender<FlushResult>),
}

/// Handle used to log audit records.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::UnboundedSender<SinkCommand>,
    client: Arc<dyn ClientContext>,
}

impl AuditSink {
    /// Create a sink handle and the worker that must be spawned to drive it.
    pub fn new(
        config: AuditConfig,
        store: Arc<dyn AuditStore>,
        actors: Arc<dyn ActorResolver>,
        client: Arc<dyn ClientContext>,
    ) -> (Self, AuditWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = AuditWorker {
            rx,
            config,
            store,
            actors,
            batch: VecDeque::new(),
            deadline: None,
        };
        (Self { tx, client }, worker)
    }

    /// Enrich `record` with client metadata and queue it.
    pub async fn log(&self, record: AuditRecord) {
        let client = self.client.client_metadata().await;
        let record = record.with_client(client);
        if self.tx.send(SinkCommand::Record(record)).is_err() {
            tracing::warn!("Audit worker stopped, record dropped");
            metrics::record_audit_dropped(1);
        }
    }

    /// Log an application-level action.
    pub async fn log_user_action(
        &self,
        action_type: &str,
        description: &str,
        module: &str,
        target_actor_id: Option<&str>,
        old_values: Option<Value>,
        new_values: Option<Value>,
    ) {
        let record = AuditRecord::new(action_type, description, module)
            .with_target(target_actor_id.map(str::to_string))
            .with_old_values(old_values)
            .with_new_values(new_values);
        self.log(record).await;
    }

    /// Log a security event under the `security_event` action type.
    pub async fn log_security_event(&self, event: &str, description: &str, severity: Severity) {
        let record = AuditRecord::new("security_event", description, "security")
            .with_new_values(Some(json!({ "event": event, "severity": severity })));
        self.log(record).await;
    }

    /// Log the outcome of a credential check.
    pub async fn log_login_attempt(&self, success: bool, identity: &str, reason: Option<&str>) {
        let (action_type, description) = if success {
            ("login_success", format!("Successful login for {}", identity))
        } else {
            ("login_failed", format!("Failed login for {}", identity))
        };
        let record = AuditRecord::new(action_type, description, "auth").with_new_values(Some(json!({
            "identity": identity,
            "success": success,
            "reason": reason,
        })));
        self.log(record).await;
    }

    /// Flush the current batch now and wait for the outcome.
    pub async fn flush(&self) -> FlushResult {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SinkCommand::Flush(reply_tx))
            .map_err(|_| AuditError::WorkerStopped)?;
        reply_rx.await.map_err(|_| AuditError::WorkerStopped)?
    }
}

/// Background task owning the pending batch.
pub struct AuditWorker {
    rx: mpsc::UnboundedReceiver<SinkCommand>,
    config: AuditConfig,
    store: Arc<dyn AuditStore>,
    actors: Arc<dyn ActorResolver>,
    batch: VecDeque<AuditRecord>,
    deadline: Option<Instant>,
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

impl AuditWorker {
    /// Run until shutdown is signalled or every sink handle is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            batch_size = self.config.batch_size,
            batch_timeout_ms = self.config.batch_timeout_ms,
            "Audit worker starting"
        );

        let mut listening = true;
        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(SinkCommand::Record(record)) => self.enqueue(record).await,
                    Some(SinkCommand::Flush(reply)) => {
                        let outcome = self.flush().await;
                        let _ = reply.send(outcome);
                    }
                    None => {
                        self.drain().await;
                        break;
                    }
                },
                _ = wait_for(deadline) => {
                    tracing::debug!(pending = self.batch.len(), "Audit batch timer fired");
                    let _ = self.flush().await;
                }
                signal = shutdown.recv(), if listening => match signal {
                    Err(broadcast::error::RecvError::Closed) => listening = false,
                    _ => {
                        self.drain().await;
                        break;
                    }
                },
            }
        }

        tracing::info!("Audit worker stopped");
    }

    fn push(&mut self, record: AuditRecord) {
        if self.batch.len() >= self.config.max_pending {
            self.batch.pop_front();
            tracing::warn!(max_pending = self.config.max_pending, "Audit queue full, oldest record dropped");
            metrics::record_audit_dropped(1);
        }
        self.batch.push_back(record);
    }

    async fn enqueue(&mut self, record: AuditRecord) {
        self.push(record);
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.config.batch_timeout());
        }
        if self.batch.len() >= self.config.batch_size {
            let _ = self.flush().await;
        }
    }

    /// Pull everything still queued, flush it, and answer pending flush requests.
    async fn drain(&mut self) {
        let mut replies = Vec::new();
        while let Ok(command) = self.rx.try_recv() {
            match command {
                SinkCommand::Record(record) => self.push(record),
                SinkCommand::Flush(reply) => replies.push(reply),
            }
        }

        let outcome = self.flush().await;
        if outcome == Err(AuditError::ActorUnresolved) {
            tracing::warn!(dropped = self.batch.len(), "No current actor at shutdown, audit records dropped");
            metrics::record_audit_dropped(self.batch.len());
            self.batch.clear();
        }
        for reply in replies {
            let _ = reply.send(outcome.clone());
        }
    }

    async fn flush(&mut self) -> FlushResult {
        if self.batch.is_empty() {
            self.deadline = None;
            return Ok(0);
        }

        let Some(actor) = self.actors.current_actor().await else {
            tracing::debug!(pending = self.batch.len(), "No current actor, audit flush skipped");
            metrics::record_audit_flush("skipped");
            self.deadline = Some(Instant::now() + self.config.batch_timeout());
            return Err(AuditError::ActorUnresolved);
        };

        self.deadline = None;
        let batch: Vec<AuditRecord> = std::mem::take(&mut self.batch).into();
        let count = batch.len();
        match self.store.write_batch(&actor, &batch).await {
            Ok(()) => {
                tracing::debug!(count, organization = %actor.organization_id, "Audit batch flushed");
                metrics::record_audit_flush("ok");
                Ok(count)
            }
            Err(e) => {
                tracing::error!(error = %e, dropped = count, "Audit flush failed, batch dropped");
                metrics::record_audit_flush("failed");
                metrics::record_audit_dropped(count);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::context::{Actor, ClientMetadata, StaticActor, StaticClientContext};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingStore {
        batches: Mutex<Vec<Vec<AuditRecord>>>,
        fail: AtomicBool,
    }

    impl RecordingStore {
        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl AuditStore for RecordingStore {
        async fn write_batch(&self, _actor: &Actor, records: &[AuditRecord]) -> Result<(), AuditError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AuditError::Persistence("audit table unavailable".to_string()));
            }
            self.batches.lock().unwrap().push(records.to_vec());
            Ok(())
        }
    }

    fn actor() -> Option<Actor> {
        Some(Actor {
            id: "svc".to_string(),
            organization_id: "C1".to_string(),
        })
    }

    /// Resolves no actor until `ready` is set.
    #[derive(Default)]
    struct LateActor {
        ready: AtomicBool,
    }

    #[async_trait]
    impl ActorResolver for LateActor {
        async fn current_actor(&self) -> Option<Actor> {
            if self.ready.load(Ordering::SeqCst) {
                actor()
            } else {
                None
            }
        }
    }

    fn start(
        config: AuditConfig,
        actor: Option<Actor>,
    ) -> (AuditSink, Arc<RecordingStore>, broadcast::Sender<()>, tokio::task::JoinHandle<()>) {
        start_with(config, Arc::new(StaticActor::new(actor)))
    }

    fn start_with(
        config: AuditConfig,
        actors: Arc<dyn ActorResolver>,
    ) -> (AuditSink, Arc<RecordingStore>, broadcast::Sender<()>, tokio::task::JoinHandle<()>) {
        let store = Arc::new(RecordingStore::default());
        let client = StaticClientContext::new(ClientMetadata {
            source_address: Some("10.1.2.3".to_string()),
            client_agent: Some("portal".to_string()),
        });
        let (sink, worker) = AuditSink::new(
            config,
            store.clone(),
            actors,
            Arc::new(client),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(shutdown_rx));
        (sink, store, shutdown_tx, handle)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_trigger_flushes_full_batch_once() {
        let (sink, store, _shutdown, _handle) = start(AuditConfig::default(), actor());

        for i in 0..10 {
            sink.log(AuditRecord::new("data_select", format!("call {}", i), "gateway")).await;
        }
        settle().await;

        assert_eq!(store.batch_sizes(), vec![10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_trigger_flushes_partial_batch() {
        let (sink, store, _shutdown, _handle) = start(AuditConfig::default(), actor());

        for _ in 0..3 {
            sink.log(AuditRecord::new("data_select", "select on courses", "gateway")).await;
        }
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(store.batch_sizes().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.batch_sizes(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_enriched_at_log_time() {
        let (sink, store, _shutdown, _handle) = start(AuditConfig::default(), actor());

        sink.log_login_attempt(false, "student@college.edu", Some("bad password")).await;
        assert_eq!(sink.flush().await, Ok(1));

        let batches = store.batches.lock().unwrap();
        let record = &batches[0][0];
        assert_eq!(record.action_type, "login_failed");
        assert_eq!(record.source_address.as_deref(), Some("10.1.2.3"));
        assert_eq!(record.client_agent.as_deref(), Some("portal"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_drops_batch() {
        let (sink, store, _shutdown, _handle) = start(AuditConfig::default(), actor());
        store.fail.store(true, Ordering::SeqCst);

        sink.log_security_event("query_error", "store unreachable", Severity::Medium).await;
        assert!(matches!(sink.flush().await, Err(AuditError::Persistence(_))));

        store.fail.store(false, Ordering::SeqCst);
        assert_eq!(sink.flush().await, Ok(0));
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_actor_keeps_batch() {
        let (sink, store, _shutdown, _handle) = start(AuditConfig::default(), None);

        sink.log_user_action("grade_change", "Grade updated", "grades", Some("s-9"), None, None).await;
        assert_eq!(sink.flush().await, Err(AuditError::ActorUnresolved));
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_queue() {
        let (sink, store, shutdown, handle) = start(AuditConfig::default(), actor());

        for _ in 0..4 {
            sink.log(AuditRecord::new("data_delete", "delete on sessions", "gateway")).await;
        }
        let _ = shutdown.send(());
        handle.await.unwrap();

        assert_eq!(store.batch_sizes(), vec![4]);
        assert_eq!(sink.flush().await, Err(AuditError::WorkerStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_cap_drops_oldest() {
        let config = AuditConfig {
            batch_size: 2,
            max_pending: 2,
            ..AuditConfig::default()
        };
        let (sink, store, _shutdown, _handle) = start(config, None);

        for i in 0..5 {
            sink.log(AuditRecord::new("data_select", format!("call {}", i), "gateway")).await;
        }
        settle().await;
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_actor_retried_on_next_timer() {
        let actors = Arc::new(LateActor::default());
        let (sink, store, _shutdown, _handle) = start_with(AuditConfig::default(), actors.clone());

        for _ in 0..3 {
            sink.log(AuditRecord::new("data_select", "select on courses", "gateway")).await;
        }
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert!(store.batch_sizes().is_empty());

        actors.ready.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(store.batch_sizes(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drain_respects_queue_cap() {
        let config = AuditConfig {
            max_pending: 2,
            ..AuditConfig::default()
        };
        let (sink, store, shutdown, handle) = start(config, actor());

        for i in 0..5 {
            sink.log(AuditRecord::new("data_select", format!("call {}", i), "gateway")).await;
        }
        let _ = shutdown.send(());
        handle.await.unwrap();

        let batches = store.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][1].description, "call 4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_without_actor_drops_pending() {
        let (sink, store, shutdown, handle) = start(AuditConfig::default(), None);

        sink.log(AuditRecord::new("data_insert", "insert on courses", "gateway")).await;
        let _ = shutdown.send(());
        handle.await.unwrap();

        assert!(store.batch_sizes().is_empty());
    }
}
