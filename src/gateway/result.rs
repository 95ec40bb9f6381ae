//! Caller-facing outcome of a gateway call.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::GatewayError;

/// The four gateway operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Action type of the per-call audit record.
    pub fn audit_action(&self) -> &'static str {
        match self {
            Self::Select => "data_select",
            Self::Insert => "data_insert",
            Self::Update => "data_update",
            Self::Delete => "data_delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one gateway call. Failures are represented here, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub data: Option<Value>,
    pub error: Option<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl OperationResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
            success: true,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(error: &GatewayError) -> Self {
        Self {
            data: None,
            error: Some(error.to_string()),
            success: false,
            timestamp: Utc::now(),
        }
    }

    /// Number of rows when the payload is an array.
    pub fn row_count(&self) -> Option<usize> {
        self.data.as_ref().and_then(Value::as_array).map(Vec::len)
    }
}

impl From<Result<Value, GatewayError>> for OperationResult {
    fn from(outcome: Result<Value, GatewayError>) -> Self {
        match outcome {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(&e),
        }
    }
}
