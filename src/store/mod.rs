//! Data store boundary.
//!
//! # Data Flow
//! ```text
//! Gateway (typed QueryOptions / payload)
//!     → DataStore trait
//!         → rest.rs (PostgREST-style HTTP over reqwest)
//!         → memory.rs (in-process tables)
//!     → (payload | StoreError)
//! ```
//!
//! # Design Decisions
//! - The store is a black box: no retries, caching or sanitization here
//! - Payloads are opaque JSON; row-returning calls yield a JSON array
//! - Query descriptors are typed and translated only at this boundary

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod memory;
pub mod query;
pub mod rest;

pub use memory::MemoryStore;
pub use query::{filters, Filters, OrderBy, QueryOptions};
pub use rest::RestStore;

/// Errors reported by a store implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The request never got a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("store returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The request could not be expressed for this store.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Abstract CRUD backend reachable asynchronously.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Filtered, ordered, paginated read. Returns an array of rows.
    async fn select(&self, table: &str, query: &QueryOptions) -> StoreResult<Value>;

    /// Insert one row (object) or many (array). Returns the inserted rows.
    async fn insert(&self, table: &str, data: &Value) -> StoreResult<Value>;

    /// Merge `data` into every row matching `filters`. Returns the updated rows.
    async fn update(&self, table: &str, data: &Value, filters: &Filters) -> StoreResult<Value>;

    /// Delete every row matching `filters`. Returns the deleted rows.
    async fn delete(&self, table: &str, filters: &Filters) -> StoreResult<Value>;
}
