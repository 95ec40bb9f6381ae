//! Data Access Gateway Library

pub mod admin;
pub mod audit;
pub mod config;
pub mod gateway;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod store;

pub use config::schema::GatewayConfig;
pub use gateway::{Gateway, OperationResult};
pub use lifecycle::Shutdown;
