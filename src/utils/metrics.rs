//! Observability and Metrics
//!
//! Per-connection counters for exchanges, retries and faults on the serial
//! link. Uses atomic counters so the background reader and the command path
//! can both record without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for one SSP connection
#[derive(Debug)]
pub struct Metrics {
    /// Commands handed to the framer
    pub exchanges_total: AtomicU64,
    /// Exchanges that produced an accepted reply
    pub exchanges_ok: AtomicU64,
    /// Frames written again after a reply timeout
    pub retransmissions: AtomicU64,
    /// Reply timeouts (per transmission)
    pub timeouts: AtomicU64,
    /// Plain frames with a bad outer CRC
    pub frame_errors: AtomicU64,
    /// Encrypted replies with a bad inner CRC or counter
    pub encrypted_faults: AtomicU64,
    /// Commands re-sent under the encrypted-fault retry policy
    pub encrypted_retries: AtomicU64,
    /// Key negotiations started
    pub negotiations_total: AtomicU64,
    /// Key negotiations that produced a session key
    pub negotiations_success: AtomicU64,
    /// Bytes written to the transport (stuffed)
    pub bytes_sent: AtomicU64,
    /// Bytes drained from the transport
    pub bytes_received: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            exchanges_total: AtomicU64::new(0),
            exchanges_ok: AtomicU64::new(0),
            retransmissions: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            frame_errors: AtomicU64::new(0),
            encrypted_faults: AtomicU64::new(0),
            encrypted_retries: AtomicU64::new(0),
            negotiations_total: AtomicU64::new(0),
            negotiations_success: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn exchange_started(&self) {
        self.exchanges_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exchange_ok(&self) {
        self.exchanges_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retransmission(&self) {
        self.retransmissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_error(&self) {
        self.frame_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn encrypted_fault(&self) {
        self.encrypted_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn encrypted_retry(&self) {
        self.encrypted_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn negotiation_attempt(&self) {
        self.negotiations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn negotiation_success(&self) {
        self.negotiations_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame written to the transport
    pub fn bytes_written(&self, byte_count: u64) {
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record bytes drained by the reader
    pub fn bytes_read(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exchanges_total: self.exchanges_total.load(Ordering::Relaxed),
            exchanges_ok: self.exchanges_ok.load(Ordering::Relaxed),
            retransmissions: self.retransmissions.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
            encrypted_faults: self.encrypted_faults.load(Ordering::Relaxed),
            encrypted_retries: self.encrypted_retries.load(Ordering::Relaxed),
            negotiations_total: self.negotiations_total.load(Ordering::Relaxed),
            negotiations_success: self.negotiations_success.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            exchanges_total = snapshot.exchanges_total,
            exchanges_ok = snapshot.exchanges_ok,
            retransmissions = snapshot.retransmissions,
            timeouts = snapshot.timeouts,
            frame_errors = snapshot.frame_errors,
            encrypted_faults = snapshot.encrypted_faults,
            encrypted_retries = snapshot.encrypted_retries,
            negotiations_total = snapshot.negotiations_total,
            negotiations_success = snapshot.negotiations_success,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            uptime_seconds = snapshot.uptime_seconds,
            "SSP link metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub exchanges_total: u64,
    pub exchanges_ok: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    pub frame_errors: u64,
    pub encrypted_faults: u64,
    pub encrypted_retries: u64,
    pub negotiations_total: u64,
    pub negotiations_success: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
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
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
