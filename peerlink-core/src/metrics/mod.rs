//! Metrics registration for observability
//!
//! Recording goes through the `metrics` facade macros at the call sites; the
//! daemon optionally installs a Prometheus exporter behind them.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Metric names used across the crate.
pub const REQUESTS_TOTAL: &str = "peerlink_requests_total";
pub const CALLS_TOTAL: &str = "peerlink_calls_total";
pub const CALL_DURATION_SECONDS: &str = "peerlink_call_duration_seconds";
pub const FRAMES_REJECTED_TOTAL: &str = "peerlink_frames_rejected_total";
pub const CONNECTIONS_ACTIVE: &str = "peerlink_connections_active";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(
        REQUESTS_TOTAL,
        "Inbound requests served, labelled by outcome (ok, not_found, bad_request, handler_error)"
    );
    describe_counter!(CALLS_TOTAL, "Outbound peer calls, labelled by outcome");
    describe_histogram!(
        CALL_DURATION_SECONDS,
        "Duration of outbound peer calls in seconds"
    );
    describe_counter!(
        FRAMES_REJECTED_TOTAL,
        "Inbound frames rejected before dispatch (oversized or malformed)"
    );
    describe_gauge!(CONNECTIONS_ACTIVE, "Currently open transport connections");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        // Describing metrics without an installed recorder is a no-op and
        // must never panic.
        init_metrics();
        init_metrics();
    }
}
