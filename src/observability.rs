use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "slotbook_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "slotbook_request_duration_seconds";

/// Counter: bookings refused over a standing appointment or block. Labels: kind.
pub const BOOKING_CONFLICTS_TOTAL: &str = "slotbook_booking_conflicts_total";

/// Counter: operator logins and token checks that failed. Labels: kind.
pub const AUTH_FAILURES_TOTAL: &str = "slotbook_auth_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: live event-stream viewers.
pub const VIEWERS_ACTIVE: &str = "slotbook_viewers_active";

/// Counter: total event-stream connections accepted.
pub const VIEWERS_TOTAL: &str = "slotbook_viewers_total";

/// Counter: records removed by the startup sweep and weekly reset.
pub const PURGED_RECORDS_TOTAL: &str = "slotbook_purged_records_total";

/// Counter: weekly resets fired.
pub const WEEKLY_RESETS_TOTAL: &str = "slotbook_weekly_resets_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
