//! Prometheus metrics recording and endpoint.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record a new WebSocket connection.
pub fn record_ws_connect() {
    metrics::gauge!("ws_connections_active").increment(1.0);
}

/// Record a WebSocket disconnection.
pub fn record_ws_disconnect() {
    metrics::gauge!("ws_connections_active").decrement(1.0);
}

/// Record an inbound event handed to the relay.
pub fn record_event(kind: &'static str) {
    let labels = [("kind", kind)];
    metrics::counter!("relay_events_total", &labels).increment(1);
}

/// Record a frame that could not be decoded.
pub fn record_rejected_frame(reason: &'static str) {
    let labels = [("reason", reason)];
    metrics::counter!("frames_rejected_total", &labels).increment(1);
}
