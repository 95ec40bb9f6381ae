//! Audit record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::context::ClientMetadata;

/// One auditable action.
///
/// Records are built by the caller, enriched with client metadata once when
/// they are logged, and never modified after they enter the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action_type: String,
    pub description: String,
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_values: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_values: Option<Value>,
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        action_type: impl Into<String>,
        description: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            description: description.into(),
            module: module.into(),
            target_actor_id: None,
            old_values: None,
            new_values: None,
            source_address: None,
            client_agent: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_target(mut self, target_actor_id: Option<String>) -> Self {
        self.target_actor_id = target_actor_id;
        self
    }

    pub fn with_old_values(mut self, values: Option<Value>) -> Self {
        self.old_values = values;
        self
    }

    pub fn with_new_values(mut self, values: Option<Value>) -> Self {
        self.new_values = values;
        self
    }

    /// Attach network metadata. Fields already set by the caller are kept.
    pub fn with_client(mut self, client: ClientMetadata) -> Self {
        if self.source_address.is_none() {
            self.source_address = client.source_address;
        }
        if self.client_agent.is_none() {
            self.client_agent = client.client_agent;
        }
        self
    }
}
