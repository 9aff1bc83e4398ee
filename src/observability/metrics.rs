//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `kube_secret_sync_notifications_total` - Watch notifications received, by kind and event
//! - `kube_secret_sync_dispatch_errors_total` - Notifications whose handler failed, by kind
//! - `kube_secret_sync_dispatch_duration_seconds` - Time spent handling one notification
//! - `kube_secret_sync_replica_operations_total` - Replica reconciliations, by outcome
//! - `kube_secret_sync_watch_opens_total` - Watch streams opened, by kind
//! - `kube_secret_sync_watch_errors_total` - Watch failures, by kind and class

use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static NOTIFICATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_secret_sync_notifications_total",
            "Total number of watch notifications received",
        ),
        &["kind", "event"],
    )
    .expect("Failed to create NOTIFICATIONS_TOTAL metric - this should never happen")
});

static DISPATCH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_secret_sync_dispatch_errors_total",
            "Total number of notifications whose handler failed",
        ),
        &["kind"],
    )
    .expect("Failed to create DISPATCH_ERRORS_TOTAL metric - this should never happen")
});

static DISPATCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "kube_secret_sync_dispatch_duration_seconds",
            "Duration of notification handling in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["kind"],
    )
    .expect("Failed to create DISPATCH_DURATION metric - this should never happen")
});

static REPLICA_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_secret_sync_replica_operations_total",
            "Total number of replica reconciliations by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create REPLICA_OPERATIONS_TOTAL metric - this should never happen")
});

static WATCH_OPENS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_secret_sync_watch_opens_total",
            "Total number of watch streams opened",
        ),
        &["kind"],
    )
    .expect("Failed to create WATCH_OPENS_TOTAL metric - this should never happen")
});

static WATCH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_secret_sync_watch_errors_total",
            "Total number of watch failures by class",
        ),
        &["kind", "class"],
    )
    .expect("Failed to create WATCH_ERRORS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(NOTIFICATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DISPATCH_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DISPATCH_DURATION.clone()))?;
    REGISTRY.register(Box::new(REPLICA_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_OPENS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_notifications(kind: &str, event: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[kind, event]).inc();
}

pub fn increment_dispatch_errors(kind: &str) {
    DISPATCH_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_dispatch_duration(kind: &str, duration: f64) {
    DISPATCH_DURATION.with_label_values(&[kind]).observe(duration);
}

pub fn record_replica_operation(outcome: &str) {
    REPLICA_OPERATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_watch_opens(kind: &str) {
    WATCH_OPENS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_watch_errors(kind: &str, class: &str) {
    WATCH_ERRORS_TOTAL.with_label_values(&[kind, class]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let before = REPLICA_OPERATIONS_TOTAL
            .with_label_values(&["created"])
            .get();
        record_replica_operation("created");
        record_replica_operation("created");
        assert!(
            REPLICA_OPERATIONS_TOTAL
                .with_label_values(&["created"])
                .get()
                >= before + 2
        );
    }

    #[test]
    fn test_labels_are_independent() {
        let before = WATCH_ERRORS_TOTAL
            .with_label_values(&["LabelCheck", "closed"])
            .get();
        increment_watch_errors("LabelCheck", "expired");
        assert_eq!(
            WATCH_ERRORS_TOTAL
                .with_label_values(&["LabelCheck", "closed"])
                .get(),
            before
        );
    }
}
