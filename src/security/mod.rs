//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway call:
//!     → validator.rs sanitize (monitor screens strings, then scrubbing)
//!     → validator.rs validate_and_execute (deadline, result cap, slow query)
//!     → failures and anomalies → AuditSink as security events
//!
//! Direct callers (login handlers, admin API):
//!     → monitor.rs check_rate_limit / check_login_attempt
//!     → rate_limit.rs sliding windows
//!     → threats → rolling log + AuditSink + alerts
//! ```
//!
//! # Design Decisions
//! - Sanitization and column checks are preventive and never raise
//! - Threat categories and severities are shared types (threat.rs)

pub mod column_access;
pub mod monitor;
pub mod rate_limit;
pub mod sanitize;
pub mod threat;
pub mod validator;

pub use column_access::validate_column_access;
pub use monitor::{LoggingResponder, SweepStats, ThreatMonitor, ThreatResponder, ThreatSummary};
pub use rate_limit::RateLimiter;
pub use sanitize::sanitize_user_input;
pub use threat::{SecurityEvent, Severity, ThreatCategory, ThreatReport};
pub use validator::SecurityValidator;
