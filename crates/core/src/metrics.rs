//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Message dispatch (outcome per queue message)
//! - The publish pipeline (duration, created tasks)
//! - External services (Taskcluster, Treeherder, hg)

use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Dispatch
// =============================================================================

/// Queue messages processed, by outcome.
pub static MESSAGES_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "aurora_messages_processed_total",
            "Total queue messages processed",
        ),
        &["outcome"], // "published", an error kind label, or "requeued"
    )
    .unwrap()
});

// =============================================================================
// Publish pipeline
// =============================================================================

/// Publishing tasks created.
pub static TASKS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "aurora_tasks_created_total",
        "Total Google Play publishing tasks created",
    )
    .unwrap()
});

/// Publish attempt duration in seconds.
pub static PUBLISH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "aurora_publish_duration_seconds",
            "Duration of a publish attempt",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// External services
// =============================================================================

/// External service requests by service and result.
pub static EXTERNAL_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "aurora_external_requests_total",
            "Total requests to external services",
        ),
        &["service", "result"], // service: "taskcluster_index", "taskcluster_queue", "treeherder", "hg"
    )
    .unwrap()
});

pub fn record_message(outcome: &str) {
    MESSAGES_PROCESSED.with_label_values(&[outcome]).inc();
}

pub fn record_task_created() {
    TASKS_CREATED.inc();
}

pub fn observe_publish(result: &str, elapsed: Duration) {
    PUBLISH_DURATION
        .with_label_values(&[result])
        .observe(elapsed.as_secs_f64());
}

pub fn record_external_request(service: &str, result: &str) {
    EXTERNAL_REQUESTS
        .with_label_values(&[service, result])
        .inc();
}

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(MESSAGES_PROCESSED.clone()),
        Box::new(TASKS_CREATED.clone()),
        Box::new(PUBLISH_DURATION.clone()),
        Box::new(EXTERNAL_REQUESTS.clone()),
    ]
}
