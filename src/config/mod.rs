//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, path from GATEWAY_CONFIG)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → sections handed to gateway, audit, monitor, admin
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → Gateway::apply_settings swaps execution settings atomically
//! ```
//!
//! # Design Decisions
//! - Only execution settings (timeouts, retries, cache) are hot-reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

use std::sync::Arc;

use arc_swap::ArcSwap;

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ActorConfig, AdminConfig, AlertThresholds, AuditConfig, ColumnPolicy, GatewayConfig,
    GatewaySettings, MonitorConfig, ObservabilityConfig, RateLimitConfig, SecurityConfig,
    StoreConfig,
};

/// Execution settings shared between the gateway, the validator and the
/// config watcher. Swapped atomically on reload.
pub type SharedSettings = Arc<ArcSwap<GatewaySettings>>;
