//! Bounded query execution and input screening.
//!
//! # Responsibilities
//! - Audit each execution before it starts
//! - Enforce the query deadline
//! - Flag failed and slow executions as security events
//! - Cap array results at `max_result_size`
//! - Screen untrusted input with the threat monitor, then scrub it
//!
//! # Design Decisions
//! - Truncation is silent towards the caller: the result is shortened and a
//!   low severity event records that it happened
//! - Settings are read once per execution from the shared snapshot, so a
//!   reload never changes limits halfway through a call

use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::time::Instant;

use crate::audit::AuditSink;
use crate::config::{ColumnPolicy, SharedSettings};
use crate::gateway::{GatewayError, OperationKind};
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::security::column_access;
use crate::security::monitor::ThreatMonitor;
use crate::security::sanitize::{collect_strings, sanitize_user_input};
use crate::security::threat::Severity;
use crate::store::StoreResult;

pub struct SecurityValidator {
    settings: SharedSettings,
    monitor: Arc<ThreatMonitor>,
    audit: AuditSink,
    column_policy: ColumnPolicy,
}

impl SecurityValidator {
    pub fn new(
        settings: SharedSettings,
        monitor: Arc<ThreatMonitor>,
        audit: AuditSink,
        column_policy: ColumnPolicy,
    ) -> Self {
        Self {
            settings,
            monitor,
            audit,
            column_policy,
        }
    }

    pub fn monitor(&self) -> &Arc<ThreatMonitor> {
        &self.monitor
    }

    /// Execute `query` under the configured deadline and result cap.
    ///
    /// `context` names what is being executed, typically the table.
    pub async fn validate_and_execute<F>(
        &self,
        query: F,
        operation: OperationKind,
        context: &str,
    ) -> Result<Value, GatewayError>
    where
        F: Future<Output = StoreResult<Value>>,
    {
        let settings = self.settings.load_full();

        self.audit
            .log_user_action(
                "query_execution",
                &format!("Executing {} on {}", operation, context),
                "gateway",
                None,
                None,
                Some(json!({ "operation": operation.as_str(), "context": context })),
            )
            .await;

        let started = Instant::now();
        let outcome = match with_deadline(settings.timeout(), query).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(GatewayError::from(e)),
            Err(timed_out) => Err(GatewayError::from(timed_out)),
        };
        let elapsed = started.elapsed();

        let mut value = match outcome {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(operation = %operation, context, error = %e, "Query failed");
                self.audit
                    .log_security_event(
                        "query_error",
                        &format!("{} on {} failed: {}", operation, context, e),
                        Severity::Medium,
                    )
                    .await;
                return Err(e);
            }
        };

        if elapsed > settings.slow_query_threshold() {
            tracing::warn!(
                operation = %operation,
                context,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow query"
            );
            metrics::record_slow_query();
            self.audit
                .log_security_event(
                    "slow_query",
                    &format!("{} on {} took {}ms", operation, context, elapsed.as_millis()),
                    Severity::Low,
                )
                .await;
        }

        if let Value::Array(rows) = &mut value {
            let cap = settings.max_result_size;
            if rows.len() > cap {
                let original = rows.len();
                rows.truncate(cap);
                tracing::warn!(context, original, returned = cap, "Result truncated");
                metrics::record_truncated_result();
                self.audit
                    .log_security_event(
                        "result_truncated",
                        &format!("{} rows from {} truncated to {}", original, context, cap),
                        Severity::Low,
                    )
                    .await;
            }
        }

        Ok(value)
    }

    /// Screen every string in `value` for injection, then scrub it.
    ///
    /// Only the first matching string is reported to the monitor.
    pub async fn sanitize(&self, value: &Value, context: &str, actor_id: Option<&str>) -> Value {
        let mut strings = Vec::new();
        collect_strings(value, &mut strings);
        for s in strings {
            if self.monitor.detect_injection_attempt(s, context, actor_id).await {
                break;
            }
        }
        sanitize_user_input(value)
    }

    pub fn validate_column_access<S: AsRef<str>>(&self, table: &str, columns: &[S], role: &str) -> bool {
        let allowed = column_access::validate_column_access(&self.column_policy, table, columns, role);
        if !allowed {
            tracing::debug!(table, role, "Column access denied");
        }
        allowed
    }
}
