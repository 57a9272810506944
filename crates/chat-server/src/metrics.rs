//! Metrics collection and export.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "chat_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "chat_connections_active";
    pub const MESSAGES_TOTAL: &str = "chat_messages_total";
    pub const MESSAGES_BYTES: &str = "chat_messages_bytes";
    pub const ROOMS_ACTIVE: &str = "chat_rooms_active";
    pub const DELIVERIES_TOTAL: &str = "chat_deliveries_total";
    pub const LATENCY_SECONDS: &str = "chat_dispatch_latency_seconds";
    pub const ERRORS_TOTAL: &str = "chat_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Total number of envelopes received");
    metrics::describe_counter!(names::MESSAGES_BYTES, "Total bytes of envelopes received");
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Current number of live chat rooms");
    metrics::describe_counter!(
        names::DELIVERIES_TOTAL,
        "Broadcast deliveries to participants by result"
    );
    metrics::describe_histogram!(
        names::LATENCY_SECONDS,
        "Envelope dispatch latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record an inbound envelope.
pub fn record_message(bytes: usize, message_type: &str) {
    counter!(names::MESSAGES_TOTAL, "type" => message_type.to_string()).increment(1);
    counter!(names::MESSAGES_BYTES).increment(bytes as u64);
}

/// Record broadcast delivery results.
pub fn record_deliveries(delivered: usize, failed: usize) {
    counter!(names::DELIVERIES_TOTAL, "result" => "delivered").increment(delivered as u64);
    if failed > 0 {
        counter!(names::DELIVERIES_TOTAL, "result" => "failed").increment(failed as u64);
    }
}

/// Record dispatch latency.
pub fn record_latency(seconds: f64) {
    histogram!(names::LATENCY_SECONDS).record(seconds);
}

/// Update live room count.
pub fn set_active_rooms(count: usize) {
    gauge!(names::ROOMS_ACTIVE).set(count as f64);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
