//! Prometheus metrics for detection and execution.
//!
//! This module provides metrics for:
//! - Quotes evaluated and opportunities detected
//! - Orders dispatched, filled, failed and timed out
//! - Positions by final status
//! - Order and end-to-end execution latency

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

use crate::market::Outcome;
use crate::trading::PositionStatus;

// === Metric Name Constants ===

/// Quotes evaluated counter metric name.
pub const METRIC_QUOTES_EVALUATED: &str = "quotes_evaluated_total";
/// Invalid quotes counter metric name.
pub const METRIC_QUOTES_INVALID: &str = "quotes_invalid_total";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Orders dispatched counter metric name.
pub const METRIC_ORDERS_DISPATCHED: &str = "orders_dispatched_total";
/// Orders filled counter metric name.
pub const METRIC_ORDERS_FILLED: &str = "orders_filled_total";
/// Orders failed counter metric name.
pub const METRIC_ORDERS_FAILED: &str = "orders_failed_total";
/// Leg timeouts counter metric name.
pub const METRIC_LEG_TIMEOUTS: &str = "leg_timeouts_total";
/// Positions counter metric name, labelled by status.
pub const METRIC_POSITIONS: &str = "positions_total";
/// Positions left with unpaired shares, labelled by the exposed outcome.
pub const METRIC_UNHEDGED_POSITIONS: &str = "unhedged_positions_total";
/// Order placement latency metric name.
pub const METRIC_ORDER_LATENCY: &str = "order_latency_ms";
/// Execution latency metric name.
pub const METRIC_EXECUTION_LATENCY: &str = "execution_latency_ms";
/// Scan cycle latency metric name.
pub const METRIC_SCAN_LATENCY: &str = "scan_latency_ms";

/// Install the Prometheus recorder and register metric descriptions.
///
/// Call once at startup; the handle renders the `/metrics` body.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Initialize all metric descriptions.
pub fn init_metrics() {
    describe_counter!(METRIC_QUOTES_EVALUATED, "Total number of quotes evaluated");
    describe_counter!(
        METRIC_QUOTES_INVALID,
        "Total number of quotes rejected as malformed"
    );
    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total number of arbitrage opportunities detected"
    );
    describe_counter!(METRIC_ORDERS_DISPATCHED, "Total number of leg orders dispatched");
    describe_counter!(METRIC_ORDERS_FILLED, "Total number of leg orders with a fill");
    describe_counter!(
        METRIC_ORDERS_FAILED,
        "Total number of leg orders refused or unresolved"
    );
    describe_counter!(
        METRIC_LEG_TIMEOUTS,
        "Total number of leg placements that timed out"
    );
    describe_counter!(METRIC_POSITIONS, "Total number of positions by final status");
    describe_counter!(
        METRIC_UNHEDGED_POSITIONS,
        "Total number of positions left holding unpaired shares"
    );

    describe_histogram!(METRIC_ORDER_LATENCY, "Leg placement latency in milliseconds");
    describe_histogram!(
        METRIC_EXECUTION_LATENCY,
        "Dual-leg execution latency in milliseconds"
    );
    describe_histogram!(METRIC_SCAN_LATENCY, "Scan cycle latency in milliseconds");

    debug!("Metrics initialized");
}

/// Record leg placement latency.
pub fn record_order_latency(start: Instant) {
    histogram!(METRIC_ORDER_LATENCY).record(elapsed_ms(start));
}

/// Record dual-leg execution latency.
pub fn record_execution_latency(start: Instant) {
    histogram!(METRIC_EXECUTION_LATENCY).record(elapsed_ms(start));
}

/// Add to the quotes evaluated counter.
pub fn add_quotes_evaluated(count: u64) {
    counter!(METRIC_QUOTES_EVALUATED).increment(count);
}

/// Add to the invalid quotes counter.
pub fn add_quotes_invalid(count: u64) {
    counter!(METRIC_QUOTES_INVALID).increment(count);
}

/// Add to the opportunities detected counter.
pub fn add_opportunities_detected(count: u64) {
    counter!(METRIC_OPPORTUNITIES_DETECTED).increment(count);
}

/// Increment orders dispatched counter.
pub fn inc_orders_dispatched() {
    counter!(METRIC_ORDERS_DISPATCHED).increment(1);
}

/// Increment orders filled counter.
pub fn inc_orders_filled() {
    counter!(METRIC_ORDERS_FILLED).increment(1);
}

/// Increment orders failed counter.
pub fn inc_orders_failed() {
    counter!(METRIC_ORDERS_FAILED).increment(1);
}

/// Increment leg timeouts counter.
pub fn inc_leg_timeouts() {
    counter!(METRIC_LEG_TIMEOUTS).increment(1);
}

/// Count a finalized position under its status.
pub fn inc_positions(status: PositionStatus) {
    counter!(METRIC_POSITIONS, "status" => status.as_label()).increment(1);
}

/// Count a position left holding unpaired `outcome` shares.
pub fn inc_unhedged_positions(outcome: Outcome) {
    let label = match outcome {
        Outcome::Yes => "yes",
        Outcome::No => "no",
    };
    counter!(METRIC_UNHEDGED_POSITIONS, "outcome" => label).increment(1);
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        elapsed_ms(self.start)
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for one scan cycle.
pub fn timer_scan() -> LatencyTimer {
    LatencyTimer::new(METRIC_SCAN_LATENCY)
}
