//! Real-time rare-event monitor.
//!
//! Every recorded event is persisted, folded into a bounded in-memory window
//! and followed by a fresh [`AnalysisSnapshot`]. Observers receive an
//! `analysis_update` for each event plus a separate `alert` when the alert
//! policy fires. Observers run after all internal locks are released, so a
//! callback may call back into the monitor.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::event::TelemetryEvent;
use super::rare_event::{
    ConfidenceInterval, ConfidenceLevel, ObservedStats, TestKind, TestResult,
    TheoreticalProbability, confidence_interval, measure_actual, statistical_test_with_min,
    theoretical_probability,
};
use super::store::{MemoryTelemetryStore, TelemetryStore};
use crate::core::config::MonitorConfig;

/// Sample size past which a quiet monitor is considered well established.
pub const ESTABLISHED_SAMPLE_SIZE: u64 = 10_000;

/// Why an alert fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// The binomial test was significant.
    StatisticalAnomaly,
    /// The z-score exceeded the deviation limit.
    HighDeviation,
}

/// Alert urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Worth a look.
    Medium,
    /// Act now.
    High,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Raised when observed rare-event frequency drifts from theory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Trigger.
    pub kind: AlertKind,
    /// Urgency.
    pub severity: AlertSeverity,
    /// What was seen.
    pub message: String,
    /// Suggested action.
    pub recommendation: String,
    /// Window size when raised.
    pub sample_size: u64,
    /// Test p-value.
    pub p_value: Option<f64>,
    /// Signed deviation in standard deviations.
    pub z_score: Option<f64>,
    /// RFC 3339 timestamp.
    pub raised_at: String,
}

/// Theory, observation, test and interval for the current window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    /// Expected rate.
    pub theoretical: TheoreticalProbability,
    /// Counts in the window.
    pub observed: ObservedStats,
    /// Binomial test outcome.
    pub test: TestResult,
    /// Wilson interval for the observed rate.
    pub interval: ConfidenceInterval,
    /// Alert raised by this analysis, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

/// Message delivered to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorNotification {
    /// Sent after every recorded event.
    AnalysisUpdate {
        /// Event just recorded.
        event: TelemetryEvent,
        /// Analysis including it.
        analysis: AnalysisSnapshot,
    },
    /// Sent when an alert fires.
    Alert {
        /// The new alert.
        alert: Alert,
        /// Analysis that raised it.
        analysis: AnalysisSnapshot,
    },
}

/// Summary for operators.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    /// RFC 3339 timestamp.
    pub generated_at: String,
    /// Events in the window.
    pub total_events: u64,
    /// Current analysis.
    pub analysis: AnalysisSnapshot,
    /// Most recent alerts, oldest first.
    pub alerts: Vec<Alert>,
    /// Operator guidance.
    pub recommendations: Vec<String>,
}

/// Handle returned by [`RealTimeMonitor::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&MonitorNotification) + Send + Sync>;

/// Rolling rare-event monitor over a telemetry store.
pub struct RealTimeMonitor {
    config: MonitorConfig,
    theoretical: TheoreticalProbability,
    store: Mutex<Box<dyn TelemetryStore>>,
    window: Mutex<VecDeque<TelemetryEvent>>,
    alerts: Mutex<VecDeque<Alert>>,
    observers: RwLock<Vec<(SubscriptionId, Observer)>>,
    next_subscription: AtomicU64,
}

impl fmt::Debug for RealTimeMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealTimeMonitor")
            .field("config", &self.config)
            .field("events", &self.window.lock().len())
            .field("alerts", &self.alerts.lock().len())
            .field("observers", &self.observers.read().len())
            .finish_non_exhaustive()
    }
}

impl RealTimeMonitor {
    /// Monitor seeded with the newest `max_events` events already in `store`.
    pub fn new(config: MonitorConfig, store: Box<dyn TelemetryStore>) -> Self {
        let mut window: VecDeque<TelemetryEvent> = store.load().into();
        let max = config.max_events.max(1);
        while window.len() > max {
            window.pop_front();
        }
        Self {
            config,
            theoretical: theoretical_probability(),
            store: Mutex::new(store),
            window: Mutex::new(window),
            alerts: Mutex::new(VecDeque::new()),
            observers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Monitor backed by a [`MemoryTelemetryStore`].
    pub fn in_memory(config: MonitorConfig) -> Self {
        let store = MemoryTelemetryStore::new(config.max_events);
        Self::new(config, Box::new(store))
    }

    /// Active thresholds.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Register an observer; keep the id to unsubscribe.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&MonitorNotification) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Events in the window.
    pub fn event_count(&self) -> u64 {
        self.window.lock().len() as u64
    }

    /// Persist `event`, re-analyze and notify observers.
    pub fn record_and_analyze(&self, event: TelemetryEvent) -> AnalysisSnapshot {
        self.store.lock().append(&event);
        {
            let mut window = self.window.lock();
            if window.len() >= self.config.max_events.max(1) {
                window.pop_front();
            }
            window.push_back(event.clone());
        }

        let analysis = self.analyze_inner(true);

        let mut notifications = vec![MonitorNotification::AnalysisUpdate {
            event,
            analysis: analysis.clone(),
        }];
        if let Some(alert) = &analysis.alert {
            notifications.push(MonitorNotification::Alert {
                alert: alert.clone(),
                analysis: analysis.clone(),
            });
        }
        self.notify(&notifications);
        analysis
    }

    /// Snapshot of the current window without recording anything.
    pub fn analyze(&self) -> AnalysisSnapshot {
        self.analyze_inner(false)
    }

    /// Analysis plus alert history and recommendations.
    pub fn generate_report(&self) -> MonitorReport {
        let analysis = self.analyze();
        let alerts: Vec<Alert> = self.alerts.lock().iter().cloned().collect();
        let total = analysis.observed.total;

        let mut recommendations = Vec::new();
        if total < self.config.min_samples_for_alert {
            recommendations.push(format!(
                "Collect more data: {total} of {} events needed before alerting is enabled",
                self.config.min_samples_for_alert
            ));
        }
        if let Some(alert) = &analysis.alert {
            recommendations.push(format!(
                "Investigate the randomness source ({} alert): {}",
                alert.severity, alert.recommendation
            ));
        } else if total > ESTABLISHED_SAMPLE_SIZE {
            recommendations.push(
                "Continue monitoring: observed frequency is consistent with theory".to_string(),
            );
        }
        if recommendations.is_empty() {
            recommendations.push("No action needed".to_string());
        }

        MonitorReport {
            generated_at: now_rfc3339(),
            total_events: total,
            analysis,
            alerts,
            recommendations,
        }
    }

    /// Drop all events and alerts, including persisted ones.
    pub fn clear(&self) {
        self.store.lock().clear();
        self.window.lock().clear();
        self.alerts.lock().clear();
    }

    fn analyze_inner(&self, remember_alert: bool) -> AnalysisSnapshot {
        let observed = measure_actual(self.window.lock().iter());
        let test =
            statistical_test_with_min(&observed, &self.theoretical, self.config.min_samples_for_test);
        let interval = confidence_interval(observed.combined, observed.total, ConfidenceLevel::P95)
            .unwrap_or(ConfidenceInterval {
                lower: 0.0,
                upper: 1.0,
                width: 1.0,
                confidence: ConfidenceLevel::P95.as_f64(),
            });
        let alert = self.evaluate_alert(&test);

        if let Some(alert) = alert.as_ref().filter(|_| remember_alert) {
            let mut history = self.alerts.lock();
            if history.len() >= self.config.max_alert_history.max(1) {
                history.pop_front();
            }
            history.push_back(alert.clone());
        }

        AnalysisSnapshot {
            theoretical: self.theoretical.clone(),
            observed,
            test,
            interval,
            alert,
        }
    }

    fn evaluate_alert(&self, test: &TestResult) -> Option<Alert> {
        if test.sample_size < self.config.min_samples_for_alert
            || test.test == TestKind::InsufficientData
        {
            return None;
        }
        let p = test.p_value?;
        let z = test.z_score?;

        let (kind, severity, message, recommendation) = if p < self.config.alert_significance {
            (
                AlertKind::StatisticalAnomaly,
                AlertSeverity::High,
                format!(
                    "rare-event frequency deviates from theory (p={p:.3e}, observed {} vs expected {:.3})",
                    test.observed, test.expected
                ),
                "Investigate the randomness source and casting pipeline".to_string(),
            )
        } else if z.abs() > self.config.max_deviation_sigma {
            (
                AlertKind::HighDeviation,
                AlertSeverity::Medium,
                format!("deviation of {z:.2} sigma without statistical significance"),
                "Keep collecting data; the deviation is not yet conclusive".to_string(),
            )
        } else {
            return None;
        };

        Some(Alert {
            kind,
            severity,
            message,
            recommendation,
            sample_size: test.sample_size,
            p_value: Some(p),
            z_score: Some(z),
            raised_at: now_rfc3339(),
        })
    }

    fn notify(&self, notifications: &[MonitorNotification]) {
        let observers: Vec<Observer> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for notification in notifications {
            for observer in &observers {
                observer(notification);
            }
        }
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
