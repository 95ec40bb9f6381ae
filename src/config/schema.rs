//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the data gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Execution settings (timeouts, retries, cache). Hot-reloadable.
    pub gateway: GatewaySettings,

    /// Audit write-behind batching.
    pub audit: AuditConfig,

    /// Threat monitor and rate limiting.
    pub monitor: MonitorConfig,

    /// Input and column-access policy.
    pub security: SecurityConfig,

    /// Backing data store connection.
    pub store: StoreConfig,

    /// Identity the daemon acts as when writing audit entries.
    pub actor: ActorConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Execution settings applied to every gateway operation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Per-execution deadline in milliseconds.
    pub timeout_ms: u64,

    /// Total executions attempted before a call is reported as failed.
    pub retries: u32,

    /// Base delay between attempts; retry n waits `n * retry_delay_ms`.
    pub retry_delay_ms: u64,

    /// Enable the response cache.
    pub cache_enabled: bool,

    /// Lifetime of a cached read in milliseconds.
    pub cache_ttl_ms: u64,

    /// Array results longer than this are truncated.
    pub max_result_size: usize,

    /// Executions slower than this are reported as slow queries.
    pub slow_query_ms: u64,
}

impl GatewaySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_ms)
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retries: 3,
            retry_delay_ms: 1_000,
            cache_enabled: true,
            cache_ttl_ms: 300_000,
            max_result_size: 1_000,
            slow_query_ms: 5_000,
        }
    }
}

/// Audit batching configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Flush as soon as this many records are queued.
    pub batch_size: usize,

    /// Flush this long after the first record of a batch was queued.
    pub batch_timeout_ms: u64,

    /// Upper bound on queued records while flushes cannot proceed.
    pub max_pending: usize,

    /// Table that receives audit entries.
    pub table: String,

    /// Column holding the organization scope of each entry.
    pub organization_column: String,
}

impl AuditConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_timeout_ms: 5_000,
            max_pending: 10_000,
            table: "audit_logs".to_string(),
            organization_column: "college_id".to_string(),
        }
    }
}

/// Sliding-window limit: at most `max_attempts` within `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_attempts: usize,
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub fn new(max_attempts: usize, window_ms: u64) -> Self {
        Self { max_attempts, window_ms }
    }

    /// Limits suited to credential checks (5 per 15 minutes).
    pub fn login() -> Self {
        Self::new(5, 900_000)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(100, 60_000)
    }
}

/// Number of same-severity threats within the alert window that raises an alert.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            critical: 1,
            high: 3,
            medium: 5,
            low: 10,
        }
    }
}

/// Threat monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// General per-key limiter.
    pub rate_limit: RateLimitConfig,

    /// Limiter applied to login attempts.
    pub login_rate_limit: RateLimitConfig,

    pub alert_thresholds: AlertThresholds,

    /// Window over which same-severity threats are counted.
    pub alert_window_secs: u64,

    /// Threats older than this are pruned by the sweep.
    pub retention_secs: u64,

    /// Interval of the background sweep.
    pub sweep_interval_secs: u64,

    /// Per-key count at which suspicious activity is reported as a threat.
    pub suspicious_activity_threshold: u32,
}

impl MonitorConfig {
    pub fn alert_window(&self) -> Duration {
        Duration::from_secs(self.alert_window_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            login_rate_limit: RateLimitConfig::login(),
            alert_thresholds: AlertThresholds::default(),
            alert_window_secs: 3_600,
            retention_secs: 7 * 24 * 3_600,
            sweep_interval_secs: 3_600,
            suspicious_activity_threshold: 10,
        }
    }
}

/// Table -> role -> restricted columns. A `*` entry restricts every column.
pub type ColumnPolicy = HashMap<String, HashMap<String, Vec<String>>>;

/// Security policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub column_policy: ColumnPolicy,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        fn restrict(columns: &[&str]) -> Vec<String> {
            columns.iter().map(|c| c.to_string()).collect()
        }

        let mut users = HashMap::new();
        users.insert("student".to_string(), restrict(&["password_hash", "salary", "bank_account"]));
        users.insert("parent".to_string(), restrict(&["password_hash", "salary", "bank_account"]));
        users.insert("alumni".to_string(), restrict(&["*"]));

        let mut staff = HashMap::new();
        staff.insert("student".to_string(), restrict(&["salary", "bank_account", "tax_id"]));
        staff.insert("parent".to_string(), restrict(&["*"]));
        staff.insert("alumni".to_string(), restrict(&["*"]));

        let mut fees = HashMap::new();
        fees.insert("teacher".to_string(), restrict(&["payment_reference", "card_last4"]));
        fees.insert("alumni".to_string(), restrict(&["*"]));

        let mut column_policy = HashMap::new();
        column_policy.insert("users".to_string(), users);
        column_policy.insert("staff".to_string(), staff);
        column_policy.insert("fees".to_string(), fees);

        Self { column_policy }
    }
}

/// Connection to the REST data service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the REST endpoint (tables are path segments below it).
    pub base_url: String,

    /// API key sent as `apikey` and bearer token.
    pub api_key: String,

    /// HTTP client timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321/rest/v1".to_string(),
            api_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}

/// Service identity used by the daemon for audit scoping.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActorConfig {
    pub actor_id: Option<String>,
    pub organization_id: Option<String>,
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            actor_id: None,
            organization_id: None,
            source_address: None,
            client_agent: Some(concat!("data-gateway/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder key shipped in the defaults; rejected by validation when the admin API is on.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
