//! Gateway error types.

use thiserror::Error;

use crate::resilience::TimedOut;
use crate::store::StoreError;

/// Why an execution failed.
///
/// `Clone` because one failed read is handed to every coalesced caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("query timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TimedOut> for GatewayError {
    fn from(e: TimedOut) -> Self {
        Self::Timeout {
            after_ms: e.after.as_millis() as u64,
        }
    }
}
