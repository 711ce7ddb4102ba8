//! The process-wide metrics registry.
//!
//! A plain bag of atomic counters, rendered as Prometheus text on demand.
//! This and the seeded admin credential are the only process-wide mutable
//! state in the server.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counter bag. All updates are relaxed atomics.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Requests dispatched, successful or not.
    pub requests_total: AtomicU64,
    /// Requests that answered a 4xx.
    pub client_errors_total: AtomicU64,
    /// Requests that answered a 5xx.
    pub server_errors_total: AtomicU64,
    /// Body bytes received on writes.
    pub bytes_in_total: AtomicU64,
    /// Body bytes sent on reads.
    pub bytes_out_total: AtomicU64,
    /// Object versions written (put, copy, multipart completion).
    pub objects_written_total: AtomicU64,
    /// Object versions removed (explicit delete or janitor).
    pub objects_deleted_total: AtomicU64,
    /// Notification events matched and emitted.
    pub notifications_total: AtomicU64,
    /// Completed janitor passes.
    pub janitor_passes_total: AtomicU64,
    /// Versions expired by the janitor.
    pub janitor_expired_total: AtomicU64,
}

impl Metrics {
    /// Bump a counter by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Bump a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Record a response status.
    pub fn record_status(&self, status: u16) {
        Self::incr(&self.requests_total);
        if (400..500).contains(&status) {
            Self::incr(&self.client_errors_total);
        } else if status >= 500 {
            Self::incr(&self.server_errors_total);
        }
    }

    /// Render the registry as Prometheus text exposition format.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let mut out = String::with_capacity(1024);
        for (name, help, counter) in [
            (
                "basalt_requests_total",
                "Total dispatched requests.",
                &self.requests_total,
            ),
            (
                "basalt_client_errors_total",
                "Requests answered with a 4xx status.",
                &self.client_errors_total,
            ),
            (
                "basalt_server_errors_total",
                "Requests answered with a 5xx status.",
                &self.server_errors_total,
            ),
            (
                "basalt_bytes_in_total",
                "Body bytes received on writes.",
                &self.bytes_in_total,
            ),
            (
                "basalt_bytes_out_total",
                "Body bytes sent on reads.",
                &self.bytes_out_total,
            ),
            (
                "basalt_objects_written_total",
                "Object versions written.",
                &self.objects_written_total,
            ),
            (
                "basalt_objects_deleted_total",
                "Object versions removed.",
                &self.objects_deleted_total,
            ),
            (
                "basalt_notifications_total",
                "Notification events emitted.",
                &self.notifications_total,
            ),
            (
                "basalt_janitor_passes_total",
                "Completed lifecycle janitor passes.",
                &self.janitor_passes_total,
            ),
            (
                "basalt_janitor_expired_total",
                "Versions expired by the janitor.",
                &self.janitor_expired_total,
            ),
        ] {
            out.push_str("# HELP ");
            out.push_str(name);
            out.push(' ');
            out.push_str(help);
            out.push_str("\n# TYPE ");
            out.push_str(name);
            out.push_str(" counter\n");
            out.push_str(name);
            out.push(' ');
            out.push_str(&counter.load(Ordering::Relaxed).to_string());
            out.push('\n');
        }
        out
    }
}
