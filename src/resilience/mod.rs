//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Store execution:
//!     → timeouts.rs (race against the configured deadline)
//!     → On failure: retries.rs (retry with backoff.rs delays)
//!     → Exhausted: error handed back to the gateway boundary
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every store call has a deadline
//! - Linear backoff: the n-th retry waits n times the base delay

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::RetryPolicy;
pub use timeouts::{with_deadline, TimedOut};
