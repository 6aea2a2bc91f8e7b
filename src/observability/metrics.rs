//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define scoring metrics (batches, item outcomes, cache, breaker)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `scorer_batches_total` (counter): batches processed
//! - `scorer_items_total` (counter): items by outcome
//! - `scorer_cache_lookups_total` (counter): cache hits and misses
//! - `scorer_batch_duration_seconds` (histogram): end-to-end batch latency
//! - `scorer_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `scorer_breaker_transitions_total` (counter): transitions by target state
//! - `scorer_chunk_timeouts_total` (counter): chunks that hit their deadline
//! - `scorer_persist_failures_total` (counter): swallowed sink errors
//! - `http_score_requests_total` (counter): batch endpoint responses by status
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder (tests, library use) every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::BreakerState;

/// Initialize the Prometheus exporter with an HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Outcome label for a single scored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Scored,
    CacheHit,
    ScorerFailed,
    Timeout,
    CircuitOpen,
}

impl ItemOutcome {
    fn as_str(self) -> &'static str {
        match self {
            ItemOutcome::Scored => "scored",
            ItemOutcome::CacheHit => "cache_hit",
            ItemOutcome::ScorerFailed => "scorer_failed",
            ItemOutcome::Timeout => "timeout",
            ItemOutcome::CircuitOpen => "circuit_open",
        }
    }
}

pub fn record_batch(items: usize, short_circuited: bool, start: Instant) {
    let short = if short_circuited { "true" } else { "false" };
    counter!("scorer_batches_total", "short_circuited" => short).increment(1);
    histogram!("scorer_batch_duration_seconds").record(start.elapsed().as_secs_f64());
    histogram!("scorer_batch_items").record(items as f64);
}

pub fn record_item(outcome: ItemOutcome) {
    counter!("scorer_items_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("scorer_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("scorer_cache_entries").set(entries as f64);
}

pub fn record_breaker_state(state: BreakerState) {
    gauge!("scorer_breaker_state").set(state.as_gauge());
}

pub fn record_breaker_transition(to: BreakerState) {
    counter!("scorer_breaker_transitions_total", "to" => to.to_string()).increment(1);
    record_breaker_state(to);
}

pub fn record_chunk_timeout() {
    counter!("scorer_chunk_timeouts_total").increment(1);
}

pub fn record_persist_failure() {
    counter!("scorer_persist_failures_total").increment(1);
}

pub fn record_score_request(status: u16) {
    counter!("http_score_requests_total", "status" => status.to_string()).increment(1);
}
