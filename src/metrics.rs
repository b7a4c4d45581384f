//! KVST - Server Metrics & Observability
//! Lock-free atomic counters for tracking server activity, in the same
//! spirit as an LSM engine's operation counters: cheap to update on the
//! hot path, consistent only eventually, never load-bearing for control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic counters for the KVST server.
///
/// All counters use `Ordering::Relaxed`: they exist for observability, not
/// synchronization, so eventual consistency across threads is sufficient.
#[derive(Debug)]
pub struct ServerMetrics {
    /// Total accepted TCP connections.
    pub connections_accepted: AtomicU64,
    /// Connections currently open.
    pub connections_active: AtomicU64,
    /// Total GET requests dispatched.
    pub gets: AtomicU64,
    /// Total SET requests dispatched.
    pub sets: AtomicU64,
    /// Total DELETE requests dispatched.
    pub deletes: AtomicU64,
    /// Total PING requests dispatched.
    pub pings: AtomicU64,
    /// Connections closed due to a protocol violation.
    pub protocol_errors: AtomicU64,
    /// Total AOL records appended (SET + applied DELETE).
    pub aol_records_written: AtomicU64,
    /// Timestamp the server was opened.
    started: Instant,
}

impl ServerMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            connections_accepted: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            pings: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            aol_records_written: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aol_write(&self) {
        self.aol_records_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Uptime in seconds since the server was opened.
    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Total number of requests dispatched across all command kinds.
    pub fn total_requests(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
            + self.sets.load(Ordering::Relaxed)
            + self.deletes.load(Ordering::Relaxed)
            + self.pings.load(Ordering::Relaxed)
    }

    /// Format metrics as a human-readable report.
    pub fn report(&self) -> String {
        format!(
            "\n=== KVST Server Metrics ===\n\
             Connections:\n\
               accepted: {}\n\
               active:   {}\n\
             Requests:\n\
               get:      {}\n\
               set:      {}\n\
               delete:   {}\n\
               ping:     {}\n\
               total:    {}\n\
             Errors:\n\
               protocol: {}\n\
             Durability:\n\
               aol writes: {}\n\
             Uptime: {:.2}s",
            self.connections_accepted.load(Ordering::Relaxed),
            self.connections_active.load(Ordering::Relaxed),
            self.gets.load(Ordering::Relaxed),
            self.sets.load(Ordering::Relaxed),
            self.deletes.load(Ordering::Relaxed),
            self.pings.load(Ordering::Relaxed),
            self.total_requests(),
            self.protocol_errors.load(Ordering::Relaxed),
            self.aol_records_written.load(Ordering::Relaxed),
            self.uptime_secs(),
        )
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
