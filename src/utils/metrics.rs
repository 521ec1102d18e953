//! Observability and Metrics
//!
//! Counters for the quote server: connections, challenges, verdicts, and the
//! ways a connection can end badly. Each server owns its own [`Metrics`]
//! behind an `Arc`; handlers only ever increment.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Connections whose handler is still running
    pub connections_active: AtomicU64,
    /// Challenges sent to clients
    pub challenges_issued: AtomicU64,
    /// Responses that carried a valid proof of work
    pub solutions_accepted: AtomicU64,
    /// Responses rejected (wrong kind, malformed, or invalid proof)
    pub solutions_rejected: AtomicU64,
    /// Connections that ran past their deadline
    pub timeouts: AtomicU64,
    /// Accept and socket I/O failures
    pub connection_errors: AtomicU64,
    /// Handler panics caught at the task boundary
    pub handler_panics: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            challenges_issued: AtomicU64::new(0),
            solutions_accepted: AtomicU64::new(0),
            solutions_rejected: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn challenge_issued(&self) {
        self.challenges_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn solution_accepted(&self) {
        self.solutions_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn solution_rejected(&self) {
        self.solutions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            challenges_issued: self.challenges_issued.load(Ordering::Relaxed),
            solutions_accepted: self.solutions_accepted.load(Ordering::Relaxed),
            solutions_rejected: self.solutions_rejected.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            challenges_issued = snapshot.challenges_issued,
            solutions_accepted = snapshot.solutions_accepted,
            solutions_rejected = snapshot.solutions_rejected,
            timeouts = snapshot.timeouts,
            connection_errors = snapshot.connection_errors,
            handler_panics = snapshot.handler_panics,
            uptime_seconds = snapshot.uptime_seconds,
            "Gateway metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub challenges_issued: u64,
    pub solutions_accepted: u64,
    pub solutions_rejected: u64,
    pub timeouts: u64,
    pub connection_errors: u64,
    pub handler_panics: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            duration_ms = self.elapsed_ms() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_gauge() {
        let metrics = Metrics::new();
        metrics.connection_established();
        metrics.connection_established();
        metrics.connection_closed();

        let snap = metrics.snapshot();
        assert_eq!(snap.connections_total, 2);
        assert_eq!(snap.connections_active, 1);
    }

    #[test]
    fn test_verdict_counters() {
        let metrics = Metrics::default();
        metrics.challenge_issued();
        metrics.solution_accepted();
        metrics.challenge_issued();
        metrics.solution_rejected();
        metrics.timeout();

        let snap = metrics.snapshot();
        assert_eq!(snap.challenges_issued, 2);
        assert_eq!(snap.solutions_accepted, 1);
        assert_eq!(snap.solutions_rejected, 1);
        assert_eq!(snap.timeouts, 1);
        assert_eq!(snap.handler_panics, 0);
    }
}
