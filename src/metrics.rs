//! Prometheus metrics for cycles, orders, and API latency.
//!
//! This module provides metrics for:
//! - Refresh cycle counts, failures, and duration
//! - Per-market refresh outcomes
//! - Order placement and cancellation
//! - HTTP request and signing latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, info};

// === Metric Name Constants ===

/// Completed cycles counter metric name.
pub const METRIC_CYCLES: &str = "cycles_total";
/// Cycles aborted by a systemic failure.
pub const METRIC_CYCLE_FAILURES: &str = "cycle_failures_total";
/// Cycle duration metric name.
pub const METRIC_CYCLE_DURATION: &str = "cycle_duration_ms";
/// Candidate markets in the last cycle.
pub const METRIC_CANDIDATE_MARKETS: &str = "candidate_markets";
/// Account balance in cents.
pub const METRIC_BALANCE_CENTS: &str = "balance_cents";
/// Per-market outcomes, labelled by outcome.
pub const METRIC_MARKET_OUTCOMES: &str = "market_outcomes_total";
/// Order submission latency metric name.
pub const METRIC_ORDER_SUBMIT_LATENCY: &str = "order_submit_latency_ms";
/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";
/// Signing latency metric name.
pub const METRIC_SIGNING_LATENCY: &str = "signing_latency_ms";
/// Order book fetch latency metric name.
pub const METRIC_ORDERBOOK_FETCH_LATENCY: &str = "orderbook_fetch_latency_ms";
/// Orders submitted counter metric name.
pub const METRIC_ORDERS_SUBMITTED: &str = "orders_submitted_total";
/// Orders failed counter metric name.
pub const METRIC_ORDERS_FAILED: &str = "orders_failed_total";
/// Orders canceled counter metric name.
pub const METRIC_ORDERS_CANCELED: &str = "orders_canceled_total";
/// Cancels that failed for a reason other than the order being gone.
pub const METRIC_CANCEL_FAILURES: &str = "cancel_failures_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(METRIC_CYCLES, "Total number of completed refresh cycles");
    describe_counter!(
        METRIC_CYCLE_FAILURES,
        "Total number of cycles aborted by a systemic failure"
    );
    describe_histogram!(METRIC_CYCLE_DURATION, "Refresh cycle duration in milliseconds");
    describe_gauge!(
        METRIC_CANDIDATE_MARKETS,
        "Markets selected for quoting in the last cycle"
    );
    describe_gauge!(METRIC_BALANCE_CENTS, "Account cash balance in cents");
    describe_counter!(
        METRIC_MARKET_OUTCOMES,
        "Per-market refresh outcomes by kind"
    );

    describe_histogram!(
        METRIC_ORDER_SUBMIT_LATENCY,
        "Order submission latency in milliseconds"
    );
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );
    describe_histogram!(
        METRIC_SIGNING_LATENCY,
        "Request signing latency in milliseconds"
    );
    describe_histogram!(
        METRIC_ORDERBOOK_FETCH_LATENCY,
        "Order book fetch latency in milliseconds"
    );

    describe_counter!(METRIC_ORDERS_SUBMITTED, "Total number of orders placed");
    describe_counter!(METRIC_ORDERS_FAILED, "Total number of order placements that failed");
    describe_counter!(METRIC_ORDERS_CANCELED, "Total number of orders canceled");
    describe_counter!(
        METRIC_CANCEL_FAILURES,
        "Total number of cancels that failed for a reason other than not-found"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus exporter on `0.0.0.0:port`.
pub fn install_exporter(port: u16) -> Result<(), String> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus exporter: {}", e))?;

    init_metrics();
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Increment completed cycles.
pub fn inc_cycles() {
    counter!(METRIC_CYCLES).increment(1);
}

/// Increment failed cycles.
pub fn inc_cycle_failures() {
    counter!(METRIC_CYCLE_FAILURES).increment(1);
}

/// Set the number of candidate markets.
pub fn set_candidate_markets(count: usize) {
    gauge!(METRIC_CANDIDATE_MARKETS).set(count as f64);
}

/// Set the last observed balance.
pub fn set_balance_cents(cents: i64) {
    gauge!(METRIC_BALANCE_CENTS).set(cents as f64);
}

/// Count one market outcome.
pub fn inc_market_outcome(outcome: &'static str) {
    counter!(METRIC_MARKET_OUTCOMES, "outcome" => outcome).increment(1);
}

/// Record order submission latency.
pub fn record_order_submit_latency(start: Instant) {
    histogram!(METRIC_ORDER_SUBMIT_LATENCY).record(elapsed_ms(start));
}

/// Record HTTP request latency.
pub fn record_http_latency(start: Instant, endpoint: &'static str) {
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "endpoint" => endpoint).record(elapsed_ms(start));
}

/// Record signing operation latency.
pub fn record_signing_latency(start: Instant) {
    histogram!(METRIC_SIGNING_LATENCY).record(elapsed_ms(start));
}

/// Record order book fetch latency.
pub fn record_orderbook_fetch_latency(start: Instant) {
    histogram!(METRIC_ORDERBOOK_FETCH_LATENCY).record(elapsed_ms(start));
}

/// Increment order submitted counter.
pub fn inc_orders_submitted() {
    counter!(METRIC_ORDERS_SUBMITTED).increment(1);
}

/// Increment orders failed counter.
pub fn inc_orders_failed() {
    counter!(METRIC_ORDERS_FAILED).increment(1);
}

/// Increment orders canceled counter.
pub fn inc_orders_canceled() {
    counter!(METRIC_ORDERS_CANCELED).increment(1);
}

/// Increment cancel failures counter.
pub fn inc_cancel_failures() {
    counter!(METRIC_CANCEL_FAILURES).increment(1);
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
        histogram!(self.metric_name).record(elapsed_ms(self.start));
    }
}

/// Create a latency timer for a refresh cycle.
pub fn timer_cycle() -> LatencyTimer {
    LatencyTimer::new(METRIC_CYCLE_DURATION)
}
