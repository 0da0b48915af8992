//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_rpc_errors_total` (counter): failed or timed-out RPCs by method
//! - `gateway_node_health` (gauge): 1=reachable, 0=unreachable
//! - `gateway_transactions_total` (counter): transaction outcomes
//! - `gateway_events_delivered_total` (counter): events handed to callbacks
//! - `gateway_event_handler_failures_total` (counter): handler errors and panics
//! - `gateway_active_subscriptions` (gauge): installed listeners

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rpc_error(op: &'static str) {
    counter!("gateway_rpc_errors_total", "op" => op).increment(1);
}

pub fn record_node_health(healthy: bool) {
    gauge!("gateway_node_health").set(if healthy { 1.0 } else { 0.0 });
}

/// `outcome` is one of submitted, confirmed, reverted, replaced, submit_failed.
pub fn record_transaction(outcome: &'static str) {
    counter!("gateway_transactions_total", "outcome" => outcome).increment(1);
}

pub fn record_event_delivered(event: &str) {
    counter!("gateway_events_delivered_total", "event" => event.to_string()).increment(1);
}

pub fn record_handler_failure() {
    counter!("gateway_event_handler_failures_total").increment(1);
}

pub fn set_active_subscriptions(count: usize) {
    gauge!("gateway_active_subscriptions").set(count as f64);
}
