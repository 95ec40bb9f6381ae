mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use common::{audit_sink, RecordingAuditStore};
use data_gateway::audit::{AuditRecord, AuditSink};
use data_gateway::config::{AuditConfig, MonitorConfig, RateLimitConfig};
use data_gateway::lifecycle::Shutdown;
use data_gateway::security::{
    SecurityEvent, Severity, ThreatCategory, ThreatMonitor, ThreatReport, ThreatResponder,
};

#[derive(Default)]
struct CountingResponder {
    calls: AtomicUsize,
}

#[async_trait]
impl ThreatResponder for CountingResponder {
    async fn respond(&self, _event: &SecurityEvent) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    monitor: Arc<ThreatMonitor>,
    sink: AuditSink,
    audit: Arc<RecordingAuditStore>,
    responder: Arc<CountingResponder>,
    _shutdown: Shutdown,
}

impl Fixture {
    fn new(config: MonitorConfig) -> Self {
        let (sink, audit, shutdown) = audit_sink(AuditConfig::default());
        let responder = Arc::new(CountingResponder::default());
        let monitor = Arc::new(ThreatMonitor::with_responder(config, sink.clone(), responder.clone()));
        Self {
            monitor,
            sink,
            audit,
            responder,
            _shutdown: shutdown,
        }
    }

    async fn events(&self, event: &str) -> Vec<AuditRecord> {
        let _ = self.sink.flush().await;
        self.audit
            .records()
            .into_iter()
            .filter(|r| r.action_type == "security_event")
            .filter(|r| r.new_values.as_ref().map(|v| v["event"] == event).unwrap_or(false))
            .collect()
    }
}

fn threat(severity: Severity) -> ThreatReport {
    ThreatReport::new(ThreatCategory::PrivilegeEscalation, severity, "role change outside admin flow")
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_blocks_then_recovers() {
    let config = MonitorConfig {
        rate_limit: RateLimitConfig::new(5, 1_000),
        ..MonitorConfig::default()
    };
    let f = Fixture::new(config);

    for _ in 0..5 {
        assert!(f.monitor.check_rate_limit("10.0.0.9").await);
    }
    assert!(!f.monitor.check_rate_limit("10.0.0.9").await);

    tokio::time::advance(Duration::from_millis(1_000)).await;
    assert!(f.monitor.check_rate_limit("10.0.0.9").await);

    assert_eq!(f.monitor.summary().medium, 1);
    assert_eq!(f.events("brute_force").await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_login_limiter_reports_high_threat() {
    let f = Fixture::new(MonitorConfig::default());

    for _ in 0..5 {
        assert!(f.monitor.check_login_attempt("student@college.edu").await);
    }
    assert!(!f.monitor.check_login_attempt("student@college.edu").await);
    assert_eq!(f.monitor.summary().high, 1);

    let _ = f.sink.flush().await;
    let failures: Vec<_> = f
        .audit
        .records()
        .into_iter()
        .filter(|r| r.action_type == "login_failed")
        .collect();
    assert_eq!(failures.len(), 1);

    f.monitor.clear_login_attempts("student@college.edu");
    assert!(f.monitor.check_login_attempt("student@college.edu").await);
}

#[tokio::test(start_paused = true)]
async fn test_alert_raised_at_threshold() {
    let f = Fixture::new(MonitorConfig::default());

    f.monitor.report_threat(threat(Severity::High)).await;
    f.monitor.report_threat(threat(Severity::High)).await;
    assert!(f.events("security_alert").await.is_empty());

    f.monitor.report_threat(threat(Severity::High)).await;
    assert_eq!(f.events("security_alert").await.len(), 1);

    // Medium threats are counted separately.
    f.monitor.report_threat(threat(Severity::Medium)).await;
    assert_eq!(f.events("security_alert").await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_alert_window_is_one_hour() {
    let f = Fixture::new(MonitorConfig::default());

    f.monitor.report_threat(threat(Severity::High)).await;
    f.monitor.report_threat(threat(Severity::High)).await;
    tokio::time::advance(Duration::from_secs(3_600)).await;
    f.monitor.report_threat(threat(Severity::High)).await;

    assert!(f.events("security_alert").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_critical_threat_alerts_and_responds() {
    let f = Fixture::new(MonitorConfig::default());

    let event = f.monitor.report_threat(threat(Severity::Critical)).await;

    assert_eq!(event.severity, Severity::Critical);
    assert_eq!(f.responder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.events("security_alert").await.len(), 1);
    assert_eq!(f.events("privilege_escalation").await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_injection_detection() {
    let f = Fixture::new(MonitorConfig::default());

    assert!(
        f.monitor
            .detect_injection_attempt("<script>alert(1)</script>", "comments", Some("u-1"))
            .await
    );
    assert!(!f.monitor.detect_injection_attempt("Linear Algebra", "courses", None).await);

    let recent = f.monitor.recent_threats(10);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].category, ThreatCategory::Injection);
    assert_eq!(recent[0].severity, Severity::High);
    assert_eq!(recent[0].actor_id.as_deref(), Some("u-1"));
}

#[tokio::test(start_paused = true)]
async fn test_suspicious_activity_threshold() {
    let f = Fixture::new(MonitorConfig::default());

    for expected in 1..=10 {
        assert_eq!(f.monitor.record_suspicious_activity("10.0.0.7").await, expected);
    }
    assert_eq!(f.events("suspicious_activity").await.len(), 1);

    f.monitor.record_suspicious_activity("10.0.0.7").await;
    assert_eq!(f.events("suspicious_activity").await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_prunes_by_age_and_resets_counters() {
    let f = Fixture::new(MonitorConfig::default());

    f.monitor.report_threat(threat(Severity::Low)).await;
    tokio::time::advance(Duration::from_secs(6 * 24 * 3_600)).await;
    f.monitor.report_threat(threat(Severity::Low)).await;
    f.monitor.record_suspicious_activity("10.0.0.7").await;
    f.monitor.record_suspicious_activity("10.0.0.7").await;

    tokio::time::advance(Duration::from_secs(24 * 3_600)).await;
    let stats = f.monitor.sweep();

    assert_eq!(stats.pruned_threats, 1);
    assert_eq!(stats.cleared_counters, 1);
    assert_eq!(f.monitor.summary().total_logged, 1);
    assert_eq!(f.monitor.record_suspicious_activity("10.0.0.7").await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_loop_stops_on_shutdown() {
    let f = Fixture::new(MonitorConfig::default());
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(f.monitor.clone().run(shutdown.subscribe()));

    f.monitor.record_suspicious_activity("10.0.0.7").await;
    tokio::time::sleep(Duration::from_secs(3_601)).await;
    assert_eq!(f.monitor.summary().suspicious_keys, 0);

    shutdown.trigger();
    handle.await.unwrap();
}
