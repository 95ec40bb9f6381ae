//! Audit subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway / Validator / Monitor
//!     → AuditSink::log (client metadata resolved once per call)
//!     → mpsc channel
//!     → AuditWorker batch
//!         → size threshold or batch timer
//!         → ActorResolver (who, which organization)
//!         → AuditStore::write_batch (bulk insert)
//! ```
//!
//! # Design Decisions
//! - Logging never fails from the caller's point of view
//! - Flush outcomes are explicit values, surfaced through metrics

use thiserror::Error;

pub mod context;
pub mod persist;
pub mod record;
pub mod sink;

pub use context::{Actor, ActorResolver, ClientContext, ClientMetadata, StaticActor, StaticClientContext};
pub use persist::{AuditStore, StoreAuditWriter};
pub use record::AuditRecord;
pub use sink::{AuditSink, AuditWorker, FlushResult};

/// Errors produced while flushing audit batches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    #[error("current actor could not be resolved")]
    ActorUnresolved,

    #[error("audit persistence failed: {0}")]
    Persistence(String),

    #[error("audit worker is not running")]
    WorkerStopped,
}
