//! Data access gateway.
//!
//! # Data Flow
//! ```text
//! select(table, options, use_cache)
//!     → sanitize filter values (validator)
//!     → cache.rs lookup: live entry → return
//!                        identical read in flight → await it
//!                        otherwise → spawn read:
//!                            RetryPolicy → SecurityValidator::validate_and_execute → DataStore
//!                            → cache result (if still current), unregister flight
//!     → one audit record + metrics
//!     → OperationResult
//!
//! insert / update / delete
//!     → sanitize payload and filters
//!     → RetryPolicy → SecurityValidator::validate_and_execute → DataStore
//!     → invalidate table in cache
//!     → one audit record + metrics
//!     → OperationResult
//! ```
//!
//! # Design Decisions
//! - This is the only place errors become values; nothing above it sees `Err`
//! - Caching and coalescing never change the audit trail: one record per call

pub mod cache;
pub mod error;
pub mod result;
pub mod service;

pub use cache::{cache_key, CacheStats, ResponseCache};
pub use error::GatewayError;
pub use result::{OperationKind, OperationResult};
pub use service::Gateway;
