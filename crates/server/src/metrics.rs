//! Prometheus metrics for the reconciler and the HTTP surface.
//!
//! `/metrics` is unauthenticated so Prometheus can scrape it. It exposes
//! aggregate counts only, but should still be reachable from the scraper
//! network alone.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static RECONCILE_CYCLES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sigtrack_reconcile_cycles_total",
        "Total number of reconcile cycles started",
    )
    .expect("metric creation failed")
});

pub static RECONCILE_TRIGGERS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sigtrack_reconcile_triggers_total",
            "Reconcile cycles by what started them",
        ),
        &["source"],
    )
    .expect("metric creation failed")
});

pub static UNITS_DISPATCHED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sigtrack_units_dispatched_total",
        "Units submitted to the status check queue",
    )
    .expect("metric creation failed")
});

pub static UNITS_SKIPPED_IN_FLIGHT: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sigtrack_units_skipped_in_flight_total",
        "Units skipped because a check for the same id was still running",
    )
    .expect("metric creation failed")
});

pub static CHECKS_IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "sigtrack_checks_in_flight",
        "Status checks currently claimed in the in-flight registry",
    )
    .expect("metric creation failed")
});

pub static CHECK_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("sigtrack_check_failures_total", "Failed status checks by kind"),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static FINALIZE_OUTCOMES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("sigtrack_finalize_total", "Finalize attempts by outcome"),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static WEBHOOK_EVENTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("sigtrack_webhook_events_total", "Webhook events by type"),
        &["event_type"],
    )
    .expect("metric creation failed")
});

pub static REQUESTS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sigtrack_requests_created_total",
        "Signature requests accepted through the API",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(RECONCILE_CYCLES.clone()),
            Box::new(RECONCILE_TRIGGERS.clone()),
            Box::new(UNITS_DISPATCHED.clone()),
            Box::new(UNITS_SKIPPED_IN_FLIGHT.clone()),
            Box::new(CHECKS_IN_FLIGHT.clone()),
            Box::new(CHECK_FAILURES.clone()),
            Box::new(FINALIZE_OUTCOMES.clone()),
            Box::new(WEBHOOK_EVENTS.clone()),
            Box::new(REQUESTS_CREATED.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

/// Handler for `GET /metrics`.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

pub fn record_check_failure(kind: &str) {
    CHECK_FAILURES.with_label_values(&[kind]).inc();
}

/// Webhook event label; unknown or missing types share one bucket.
pub fn record_webhook_event(event_type: Option<&str>) {
    let label = match event_type {
        Some(t) if t.starts_with("signature_request.") => t,
        Some(_) => "other",
        None => "missing",
    };
    WEBHOOK_EVENTS.with_label_values(&[label]).inc();
}
