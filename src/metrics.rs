//! Prometheus metrics for tick health and reconciliation activity.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Tick latency metric name.
pub const METRIC_TICK_LATENCY: &str = "tick_latency_ms";
/// Per-currency processing latency metric name.
pub const METRIC_CURRENCY_LATENCY: &str = "currency_tick_latency_ms";
/// Ticks counter metric name.
pub const METRIC_TICKS: &str = "ticks_total";
/// Per-currency failure counter metric name.
pub const METRIC_CURRENCY_FAILURES: &str = "currency_failures_total";
/// Offers submitted counter metric name.
pub const METRIC_OFFERS_SUBMITTED: &str = "offers_submitted_total";
/// Offers canceled counter metric name.
pub const METRIC_OFFERS_CANCELED: &str = "offers_canceled_total";
/// Offer rejection counter metric name.
pub const METRIC_OFFER_REJECTIONS: &str = "offer_rejections_total";
/// Skipped sub-minimum chunk counter metric name.
pub const METRIC_CHUNKS_SKIPPED: &str = "chunks_skipped_total";
/// Idle alert counter metric name.
pub const METRIC_IDLE_ALERTS: &str = "idle_alerts_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(METRIC_TICK_LATENCY, "Full tick latency in milliseconds");
    describe_histogram!(
        METRIC_CURRENCY_LATENCY,
        "Single-currency processing latency in milliseconds"
    );

    describe_counter!(METRIC_TICKS, "Total number of ticks run");
    describe_counter!(
        METRIC_CURRENCY_FAILURES,
        "Total number of per-currency failures"
    );
    describe_counter!(METRIC_OFFERS_SUBMITTED, "Total number of offers submitted");
    describe_counter!(METRIC_OFFERS_CANCELED, "Total number of offers canceled");
    describe_counter!(
        METRIC_OFFER_REJECTIONS,
        "Total number of offers the exchange rejected"
    );
    describe_counter!(
        METRIC_CHUNKS_SKIPPED,
        "Total number of chunks skipped for being below the minimum offer size"
    );
    describe_counter!(METRIC_IDLE_ALERTS, "Total number of sustained-idle alerts");

    debug!("Metrics initialized");
}

/// Record full-tick latency.
pub fn record_tick_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_TICK_LATENCY).record(latency_ms);
}

/// Record per-currency latency.
pub fn record_currency_latency(start: Instant, currency: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_CURRENCY_LATENCY, "currency" => currency.to_string()).record(latency_ms);
}

/// Increment the tick counter.
pub fn inc_ticks() {
    counter!(METRIC_TICKS).increment(1);
}

/// Increment the per-currency failure counter.
pub fn inc_currency_failures(currency: &str) {
    counter!(METRIC_CURRENCY_FAILURES, "currency" => currency.to_string()).increment(1);
}

/// Increment the offers submitted counter.
pub fn inc_offers_submitted() {
    counter!(METRIC_OFFERS_SUBMITTED).increment(1);
}

/// Increment the offers canceled counter.
pub fn inc_offers_canceled() {
    counter!(METRIC_OFFERS_CANCELED).increment(1);
}

/// Increment the offer rejection counter.
pub fn inc_offer_rejections() {
    counter!(METRIC_OFFER_REJECTIONS).increment(1);
}

/// Increment the skipped-chunk counter.
pub fn inc_chunks_skipped() {
    counter!(METRIC_CHUNKS_SKIPPED).increment(1);
}

/// Increment the idle alert counter.
pub fn inc_idle_alerts() {
    counter!(METRIC_IDLE_ALERTS).increment(1);
}
