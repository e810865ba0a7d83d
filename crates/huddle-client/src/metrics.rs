//! Metrics collection and export for Huddle.
//!
//! Uses the `metrics` crate for instrumentation. Without an installed
//! recorder every call is a no-op; the Prometheus exporter is opt-in.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

use crate::session::SessionState;

/// Metric names.
pub mod names {
    pub const FRAMES_IN: &str = "huddle_frames_in_total";
    pub const FRAMES_OUT: &str = "huddle_frames_out_total";
    pub const FRAMES_DROPPED: &str = "huddle_frames_dropped_total";
    pub const SEND_FAILURES: &str = "huddle_send_failures_total";
    pub const STATE_TRANSITIONS: &str = "huddle_session_transitions_total";
    pub const SESSION_CONNECTED: &str = "huddle_session_connected";
    pub const TRANSCRIPT_LENGTH: &str = "huddle_transcript_length";
}

/// Describe every metric.
pub fn init_metrics() {
    metrics::describe_counter!(names::FRAMES_IN, "Frames received from the bus");
    metrics::describe_counter!(names::FRAMES_OUT, "Frames sent to the bus by destination");
    metrics::describe_counter!(
        names::FRAMES_DROPPED,
        "Inbound frames dropped, by reason"
    );
    metrics::describe_counter!(names::SEND_FAILURES, "Failed sends by destination");
    metrics::describe_counter!(
        names::STATE_TRANSITIONS,
        "Session state transitions by target state"
    );
    metrics::describe_gauge!(names::SESSION_CONNECTED, "1 while the session is connected");
    metrics::describe_gauge!(names::TRANSCRIPT_LENGTH, "Entries in the transcript");

    info!("Metrics initialized");
}

/// Install the Prometheus exporter on `port`.
///
/// # Errors
///
/// Returns an error if the listener cannot be installed.
pub fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

pub fn record_frame_in(destination: &str) {
    counter!(names::FRAMES_IN, "destination" => destination.to_string()).increment(1);
}

pub fn record_frame_out(destination: &str) {
    counter!(names::FRAMES_OUT, "destination" => destination.to_string()).increment(1);
}

/// Record a dropped inbound frame (`malformed`, `stale`, `unexpected`).
pub fn record_dropped(reason: &'static str) {
    counter!(names::FRAMES_DROPPED, "reason" => reason).increment(1);
}

pub fn record_send_failure(destination: &str) {
    counter!(names::SEND_FAILURES, "destination" => destination.to_string()).increment(1);
}

/// Record a session state transition.
pub fn record_transition(to: SessionState) {
    counter!(names::STATE_TRANSITIONS, "state" => to.as_str()).increment(1);
    let connected = if to == SessionState::Connected { 1.0 } else { 0.0 };
    gauge!(names::SESSION_CONNECTED).set(connected);
}

pub fn set_transcript_length(len: usize) {
    gauge!(names::TRANSCRIPT_LENGTH).set(len as f64);
}
