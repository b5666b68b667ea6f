//! Process-wide counters and histograms, scraped by `cli-batteries`'
//! bundled Prometheus exporter (the `prometheus` cargo feature) from the
//! crate's default registry — this module only needs to register them.

use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

pub static PHASES_DISPATCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "session_orchestrator_phases_dispatched_total",
        "Phase handlers dispatched, by phase kind",
        &["phase"]
    )
    .expect("metric registration")
});

pub static PHASE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "session_orchestrator_phase_failures_total",
        "Phase handlers that returned an error, by phase kind",
        &["phase"]
    )
    .expect("metric registration")
});

pub static AI_CALL_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "session_orchestrator_ai_call_latency_seconds",
        "AI client call latency, by operation",
        &["operation"]
    )
    .expect("metric registration")
});

pub static AI_CALL_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "session_orchestrator_ai_call_failures_total",
        "AI client calls that failed, by operation",
        &["operation"]
    )
    .expect("metric registration")
});

pub static SLEEP_DRIFT_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "session_orchestrator_sleep_drift_seconds",
        "Difference between scheduled phase time and actual dispatch time",
        &["phase"]
    )
    .expect("metric registration")
});
