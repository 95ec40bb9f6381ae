//! Threat monitoring and rate limiting.
//!
//! # Responsibilities
//! - Keep a rolling log of security events and forward each to the audit sink
//! - Raise a `security_alert` once same-severity threats within the alert
//!   window reach their threshold
//! - Hand critical threats to a [`ThreatResponder`]
//! - Sliding-window limits for general keys and login identities
//! - Screen input for SQL, script and DOM-access injection patterns
//!
//! # Design Decisions
//! - No lock is held across an await: the threat log is updated and counted
//!   under a short synchronous lock, audit forwarding happens afterwards
//! - The periodic sweep prunes the threat log by age but clears the
//!   suspicious-activity counters outright; the two retention policies are
//!   kept as separate steps

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant};

use crate::audit::AuditSink;
use crate::config::MonitorConfig;
use crate::observability::metrics;
use crate::security::rate_limit::RateLimiter;
use crate::security::threat::{SecurityEvent, Severity, ThreatCategory, ThreatReport};

static SQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bunion\b.*\bselect\b",
        r"(?i)\bselect\b.+\bfrom\b",
        r"(?i)\binsert\b.+\binto\b",
        r"(?i)\bdelete\b.+\bfrom\b",
        r"(?i)\bupdate\b.+\bset\b",
        r"(?i)\b(drop|alter|create|truncate)\s+(table|database|schema)\b",
        r"(?i)\bexec(ute)?\s*\(",
        r"(?i)'\s*(or|and)\s+'?\w+'?\s*=\s*'?\w+",
        r"'\s*;",
        r";\s*--",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static SCRIPT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)<\s*script\b",
        r"(?i)<\s*iframe\b",
        r"(?i)javascript\s*:",
        r"(?i)\bon(load|error|click|mouseover|focus)\s*=",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static DOM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bdocument\s*\.\s*(cookie|write|location|domain)\b",
        r"(?i)\bwindow\s*\.\s*location\b",
        r"(?i)\.innerHTML\b",
        r"(?i)\beval\s*\(",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Which family of patterns matched, if any.
fn injection_kind(input: &str) -> Option<&'static str> {
    let families: [(&'static str, &Lazy<Vec<Regex>>); 3] = [
        ("sql", &SQL_PATTERNS),
        ("script", &SCRIPT_PATTERNS),
        ("dom", &DOM_PATTERNS),
    ];
    families
        .into_iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(input)))
        .map(|(kind, _)| kind)
}

/// Extension point invoked for every critical threat.
#[async_trait]
pub trait ThreatResponder: Send + Sync {
    async fn respond(&self, event: &SecurityEvent);
}

/// Default responder: logs the threat and takes no further action.
pub struct LoggingResponder;

#[async_trait]
impl ThreatResponder for LoggingResponder {
    async fn respond(&self, event: &SecurityEvent) {
        tracing::error!(
            id = %event.id,
            category = %event.category,
            actor = ?event.actor_id,
            "Critical threat, immediate response required: {}",
            event.description
        );
    }
}

/// Threat counts inside the alert window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreatSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total_logged: usize,
    pub rate_limited_keys: usize,
    pub suspicious_keys: usize,
}

/// What a sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub pruned_threats: usize,
    pub cleared_counters: usize,
    pub expired_rate_keys: usize,
}

pub struct ThreatMonitor {
    config: MonitorConfig,
    audit: AuditSink,
    threats: Mutex<VecDeque<(Instant, SecurityEvent)>>,
    limiter: RateLimiter,
    login_limiter: RateLimiter,
    suspicious: DashMap<String, u32>,
    responder: Arc<dyn ThreatResponder>,
}

impl ThreatMonitor {
    pub fn new(config: MonitorConfig, audit: AuditSink) -> Self {
        Self::with_responder(config, audit, Arc::new(LoggingResponder))
    }

    pub fn with_responder(
        config: MonitorConfig,
        audit: AuditSink,
        responder: Arc<dyn ThreatResponder>,
    ) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate_limit),
            login_limiter: RateLimiter::new(config.login_rate_limit),
            config,
            audit,
            threats: Mutex::new(VecDeque::new()),
            suspicious: DashMap::new(),
            responder,
        }
    }

    fn threshold(&self, severity: Severity) -> usize {
        let t = &self.config.alert_thresholds;
        match severity {
            Severity::Critical => t.critical,
            Severity::High => t.high,
            Severity::Medium => t.medium,
            Severity::Low => t.low,
        }
    }

    /// Record a threat, forward it to the audit sink and raise alerts.
    pub async fn report_threat(&self, report: ThreatReport) -> SecurityEvent {
        let event = SecurityEvent::from(report);
        tracing::warn!(
            id = %event.id,
            category = %event.category,
            severity = %event.severity,
            actor = ?event.actor_id,
            "Security threat: {}",
            event.description
        );
        metrics::record_threat(event.category.as_str(), event.severity.as_str());

        let recent = {
            let now = Instant::now();
            let window = self.config.alert_window();
            let mut threats = self.threats.lock().unwrap_or_else(|e| e.into_inner());
            threats.push_back((now, event.clone()));
            threats
                .iter()
                .filter(|(at, e)| e.severity == event.severity && now.duration_since(*at) < window)
                .count()
        };

        self.audit
            .log_security_event(event.category.as_str(), &event.description, event.severity)
            .await;

        if recent >= self.threshold(event.severity) {
            tracing::warn!(severity = %event.severity, count = recent, "Security alert threshold reached");
            self.audit
                .log_security_event(
                    "security_alert",
                    &format!(
                        "{} {} severity threats within the alert window",
                        recent, event.severity
                    ),
                    event.severity,
                )
                .await;
        }

        if event.severity == Severity::Critical {
            self.responder.respond(&event).await;
        }

        event
    }

    /// General sliding-window check for `key`. A denial is reported as brute force.
    pub async fn check_rate_limit(&self, key: &str) -> bool {
        if self.limiter.check(key) {
            return true;
        }

        metrics::record_rate_limited("general");
        self.report_threat(
            ThreatReport::new(
                ThreatCategory::BruteForce,
                Severity::Medium,
                format!("Rate limit exceeded for {}", key),
            )
            .with_metadata("key", key),
        )
        .await;
        false
    }

    /// Login-style check for `identity` (5 attempts per 15 minutes by default).
    pub async fn check_login_attempt(&self, identity: &str) -> bool {
        if self.login_limiter.check(identity) {
            return true;
        }

        metrics::record_rate_limited("login");
        self.report_threat(
            ThreatReport::new(
                ThreatCategory::BruteForce,
                Severity::High,
                format!("Too many login attempts for {}", identity),
            )
            .with_metadata("identity", identity),
        )
        .await;
        self.audit
            .log_login_attempt(false, identity, Some("rate limited"))
            .await;
        false
    }

    /// Forget the login attempts of `identity` after a successful login.
    pub fn clear_login_attempts(&self, identity: &str) {
        self.login_limiter.reset(identity);
    }

    /// Screen `input` for injection patterns; a match is reported as a high
    /// severity injection threat.
    pub async fn detect_injection_attempt(
        &self,
        input: &str,
        context: &str,
        actor_id: Option<&str>,
    ) -> bool {
        let Some(kind) = injection_kind(input) else {
            return false;
        };

        self.report_threat(
            ThreatReport::new(
                ThreatCategory::Injection,
                Severity::High,
                format!("Injection attempt detected in {}", context),
            )
            .with_actor(actor_id.map(str::to_string))
            .with_metadata("pattern", kind)
            .with_metadata("context", context),
        )
        .await;
        true
    }

    /// Count one suspicious action for `key`; returns the new count.
    pub async fn record_suspicious_activity(&self, key: &str) -> u32 {
        let count = {
            let mut entry = self.suspicious.entry(key.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        if count == self.config.suspicious_activity_threshold {
            self.report_threat(
                ThreatReport::new(
                    ThreatCategory::SuspiciousActivity,
                    Severity::Medium,
                    format!("{} suspicious actions from {}", count, key),
                )
                .with_metadata("key", key),
            )
            .await;
        }
        count
    }

    /// Prune threats past retention, reset suspicious counters, drop idle limiter keys.
    pub fn sweep(&self) -> SweepStats {
        let now = Instant::now();
        let retention = self.config.retention();

        let pruned_threats = {
            let mut threats = self.threats.lock().unwrap_or_else(|e| e.into_inner());
            let before = threats.len();
            while let Some((at, _)) = threats.front() {
                if now.duration_since(*at) >= retention {
                    threats.pop_front();
                } else {
                    break;
                }
            }
            before - threats.len()
        };

        let cleared_counters = self.suspicious.len();
        self.suspicious.clear();

        let expired_rate_keys = self.limiter.cleanup() + self.login_limiter.cleanup();

        let stats = SweepStats {
            pruned_threats,
            cleared_counters,
            expired_rate_keys,
        };
        tracing::info!(
            pruned_threats,
            cleared_counters,
            expired_rate_keys,
            "Threat monitor sweep complete"
        );
        stats
    }

    /// Run the periodic sweep until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let period = self.config.sweep_interval();
        tracing::info!(interval_secs = period.as_secs(), "Threat monitor sweep starting");

        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Threat monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub fn summary(&self) -> ThreatSummary {
        let now = Instant::now();
        let window = self.config.alert_window();
        let threats = self.threats.lock().unwrap_or_else(|e| e.into_inner());

        let mut summary = ThreatSummary {
            total_logged: threats.len(),
            rate_limited_keys: self.limiter.tracked_keys() + self.login_limiter.tracked_keys(),
            suspicious_keys: self.suspicious.len(),
            ..ThreatSummary::default()
        };
        for (_, event) in threats.iter().filter(|(at, _)| now.duration_since(*at) < window) {
            match event.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary
    }

    /// Most recent threats, newest first.
    pub fn recent_threats(&self, limit: usize) -> Vec<SecurityEvent> {
        let threats = self.threats.lock().unwrap_or_else(|e| e.into_inner());
        threats.iter().rev().take(limit).map(|(_, e)| e.clone()).collect()
    }
}
