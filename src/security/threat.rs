//! Threat taxonomy shared by the validator, the monitor and the audit sink.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of security-relevant event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    BruteForce,
    Injection,
    Xss,
    Csrf,
    PrivilegeEscalation,
    SuspiciousActivity,
}

impl ThreatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BruteForce => "brute_force",
            Self::Injection => "injection",
            Self::Xss => "xss",
            Self::Csrf => "csrf",
            Self::PrivilegeEscalation => "privilege_escalation",
            Self::SuspiciousActivity => "suspicious_activity",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threat as reported by a caller, before the monitor stamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreatReport {
    pub category: ThreatCategory,
    pub severity: Severity,
    pub description: String,
    pub actor_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl ThreatReport {
    pub fn new(category: ThreatCategory, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            description: description.into(),
            actor_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_actor(mut self, actor_id: Option<String>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A recorded security event in the rolling threat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub category: ThreatCategory,
    pub severity: Severity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl From<ThreatReport> for SecurityEvent {
    fn from(report: ThreatReport) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: report.category,
            severity: report.severity,
            description: report.description,
            timestamp: Utc::now(),
            actor_id: report.actor_id,
            metadata: report.metadata,
        }
    }
}
