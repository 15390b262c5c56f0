//! Diagnostic side-channel
//!
//! Failures inside the logger never reach the code being logged. They are
//! reported here instead: as `tracing` events and as counters.

use crate::error::Error;
use crate::pool::TrackingId;

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

/// Point-in-time copy of the diagnostic counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Operations against a handle that was never issued or already retired
    pub stale_handles: u64,
    /// Records that could not be serialized
    pub serialization_failures: u64,
    /// Writes the sink rejected
    pub sink_write_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    stale_handles: AtomicU64,
    serialization_failures: AtomicU64,
    sink_write_failures: AtomicU64,
}

impl Diagnostics {
    pub(crate) fn stale_handle(&self, id: TrackingId, operation: &'static str) {
        self.stale_handles.fetch_add(1, Ordering::Relaxed);
        debug!(%id, operation, "ignoring inactive tracking handle");
    }

    pub(crate) fn serialization_failed(&self, error: &Error) {
        self.serialization_failures.fetch_add(1, Ordering::Relaxed);
        warn!("failed to serialize log record: {}", error);
    }

    pub(crate) fn sink_write_failed(&self, error: &Error) {
        self.sink_write_failures.fetch_add(1, Ordering::Relaxed);
        warn!("failed to write log record: {}", error);
    }

    pub(crate) fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            stale_handles: self.stale_handles.load(Ordering::Relaxed),
            serialization_failures: self.serialization_failures.load(Ordering::Relaxed),
            sink_write_failures: self.sink_write_failures.load(Ordering::Relaxed),
        }
    }
}
