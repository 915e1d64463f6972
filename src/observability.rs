//! Process-wide workflow counters and per-operation latency.
//!
//! Counters are lock-free. Operation timings are folded into a small table
//! keyed by operation name so the shutdown summary can report how often each
//! workflow call ran and how slow it got.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Counter {
    Transition,
    Rejection,
    PermissionDenied,
    NotificationSent,
    NotificationFailed,
}

const COUNTERS: usize = 5;

/// Calls, cumulative and worst latency of one workflow operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationTiming {
    pub calls: u64,
    pub total: Duration,
    pub slowest: Duration,
}

impl OperationTiming {
    fn add(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total += elapsed;
        self.slowest = self.slowest.max(elapsed);
    }

    pub fn mean(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(calls) => self.total / calls,
        }
    }
}

#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    counters: [AtomicU64; COUNTERS],
    timings: Mutex<BTreeMap<&'static str, OperationTiming>>,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, counter: Counter) {
        self.counters[counter as usize].fetch_add(1, Ordering::Relaxed);
    }

    fn read(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    pub fn record_transition(&self) {
        self.bump(Counter::Transition);
    }

    pub fn record_rejection(&self) {
        self.bump(Counter::Rejection);
    }

    pub fn record_permission_denied(&self) {
        self.bump(Counter::PermissionDenied);
    }

    pub fn record_notification_sent(&self) {
        self.bump(Counter::NotificationSent);
    }

    pub fn record_notification_failure(&self) {
        self.bump(Counter::NotificationFailed);
        warn!("Notification delivery failed");
    }

    pub fn record_duration(&self, operation: &'static str, elapsed: Duration) {
        match self.timings.lock() {
            Ok(mut timings) => timings.entry(operation).or_default().add(elapsed),
            Err(_) => warn!(operation, "Timing table poisoned; sample dropped"),
        }
    }

    pub fn get_stats(&self) -> WorkflowStats {
        let operations = self
            .timings
            .lock()
            .map(|timings| timings.clone())
            .unwrap_or_default();
        WorkflowStats {
            transitions: self.read(Counter::Transition),
            rejections: self.read(Counter::Rejection),
            permission_denials: self.read(Counter::PermissionDenied),
            notifications_sent: self.read(Counter::NotificationSent),
            notification_failures: self.read(Counter::NotificationFailed),
            operations,
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            transitions = stats.transitions,
            rejections = stats.rejections,
            permission_denials = stats.permission_denials,
            notifications_sent = stats.notifications_sent,
            notification_failures = stats.notification_failures,
            "Workflow activity"
        );
        for (operation, timing) in &stats.operations {
            info!(
                operation,
                calls = timing.calls,
                mean_ms = timing.mean().as_millis() as u64,
                slowest_ms = timing.slowest.as_millis() as u64,
                "Workflow operation latency"
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStats {
    pub transitions: u64,
    pub rejections: u64,
    pub permission_denials: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
    pub operations: BTreeMap<&'static str, OperationTiming>,
}

static WORKFLOW_METRICS: LazyLock<WorkflowMetrics> = LazyLock::new(WorkflowMetrics::new);

pub fn workflow_metrics() -> &'static WorkflowMetrics {
    &WORKFLOW_METRICS
}

/// Measures one workflow call; `finish` folds the sample into the global table
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let elapsed = self.start.elapsed();
        workflow_metrics().record_duration(self.operation, elapsed);
        debug!(operation = self.operation, duration_ms = elapsed.as_millis() as u64, "Operation completed");
    }
}
