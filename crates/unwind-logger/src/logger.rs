//! The unwind logger
//!
//! Records logged inside a tracked operation are routed by level:
//!
//! - at or above `immediate_level` (and not `full_defer`): written right away
//! - at or above `deferred_level`: buffered until the operation ends
//! - below `deferred_level`: dropped
//!
//! When the operation ends, a failure flushes everything buffered; a success
//! flushes only the records at or above `immediate_level` under `full_defer`,
//! and nothing otherwise.

use crate::config::UnwindLoggerConfig;
use crate::context::{Context, ContextKey};
use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::entry::Entry;
use crate::error::Error;
use crate::guard::TrackingGuard;
use crate::level::Level;
use crate::pool::{BufferPool, TrackingId};
use crate::record::Record;
use crate::sink::{LogSink, StdoutSink};

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

/// Logger that defers records of tracked operations until their outcome is known.
///
/// Configure it with the `with_*` methods, then share it (for example behind
/// an `Arc`); once shared, the configuration is fixed.
pub struct UnwindLogger {
    config: UnwindLoggerConfig,
    sink: Arc<dyn LogSink>,
    /// Key under which this logger binds handles into a [`Context`]
    key: ContextKey,
    pool: BufferPool,
    diagnostics: Diagnostics,
}

impl UnwindLogger {
    /// Create a logger with the default configuration, writing to stdout
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(UnwindLoggerConfig::default(), StdoutSink::new())
    }

    /// Create a logger from a complete configuration
    pub fn from_config(config: UnwindLoggerConfig, sink: impl LogSink) -> Self {
        Self {
            config,
            sink: Arc::new(sink),
            key: ContextKey::unique(),
            pool: BufferPool::with_capacity(config.initial_capacity()),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Set the immediate threshold (see [`UnwindLoggerConfig::set_immediate_level`])
    #[must_use]
    pub fn with_immediate_level(mut self, level: Level) -> Self {
        self.config.set_immediate_level(level);
        self
    }

    /// Set the deferred threshold (see [`UnwindLoggerConfig::set_deferred_level`])
    #[must_use]
    pub fn with_deferred_level(mut self, level: Level) -> Self {
        self.config.set_deferred_level(level);
        self
    }

    /// Toggle full deferral
    #[must_use]
    pub fn with_full_defer(mut self, full_defer: bool) -> Self {
        self.config.set_full_defer(full_defer);
        self
    }

    /// Replace the output sink
    #[must_use]
    pub fn with_sink(mut self, sink: impl LogSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &UnwindLoggerConfig {
        &self.config
    }

    /// Counters of internal failures and ignored handles
    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Number of operations currently being tracked
    #[must_use]
    pub fn active_operations(&self) -> usize {
        self.pool.active()
    }

    /// Number of buffers the pool has created so far
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Start tracking an operation.
    ///
    /// Returns a copy of `ctx` carrying the new handle; `ctx` itself is unchanged.
    #[must_use]
    pub fn start_tracking(&self, ctx: &Context) -> Context {
        let id = self.pool.allocate();
        debug!(%id, "started tracking");

        ctx.with_value(self.key, id)
    }

    /// Start tracking an operation, ending it when the returned guard is finished or dropped
    pub fn track(&self, ctx: &Context) -> TrackingGuard<'_> {
        TrackingGuard::new(self, self.start_tracking(ctx))
    }

    /// End a successful operation.
    ///
    /// Does nothing if `ctx` carries no active handle of this logger.
    pub fn end_tracking(&self, ctx: &Context) {
        self.finish(ctx, None);
    }

    /// End a failed operation, unwinding its deferred records
    pub fn end_tracking_with_error<E: fmt::Display + ?Sized>(&self, ctx: &Context, err: &E) {
        self.finish(ctx, Some(&err));
    }

    /// End an operation according to its result
    pub fn end_tracking_with_outcome<T, E: fmt::Display>(
        &self,
        ctx: &Context,
        outcome: &Result<T, E>,
    ) {
        match outcome {
            Ok(_) => self.end_tracking(ctx),
            Err(err) => self.end_tracking_with_error(ctx, err),
        }
    }

    /// Build a record bound to the operation tracked in `ctx`, if any
    pub fn with_context(&self, ctx: &Context) -> Entry<'_> {
        Entry::new(self, self.tracking_id(ctx))
    }

    /// Build a record that belongs to no operation
    pub fn entry(&self) -> Entry<'_> {
        Entry::new(self, None)
    }

    /// Start an unbound record with a field
    pub fn with_field<V: Serialize>(&self, key: impl Into<String>, value: V) -> Entry<'_> {
        self.entry().with_field(key, value)
    }

    /// Start an unbound record with an error
    pub fn with_error<E: fmt::Display + ?Sized>(&self, err: &E) -> Entry<'_> {
        self.entry().with_error(err)
    }

    /// Log an unbound debug record
    pub fn debug(&self, message: impl Into<String>) {
        self.entry().debug(message);
    }

    /// Log an unbound info record
    pub fn info(&self, message: impl Into<String>) {
        self.entry().info(message);
    }

    /// Log an unbound warning
    pub fn warn(&self, message: impl Into<String>) {
        self.entry().warn(message);
    }

    /// Log an unbound error
    pub fn error(&self, message: impl Into<String>) {
        self.entry().error(message);
    }

    /// Flush the sink
    pub fn flush(&self) {
        if let Err(e) = self.sink.flush() {
            self.diagnostics.sink_write_failed(&Error::SinkWrite(e));
        }
    }

    pub(crate) fn dispatch(&self, record: Record, tracking: Option<TrackingId>) {
        if self.config.writes_immediately(record.level()) {
            self.write(&record);
            return;
        }

        // Unbound records only ever take the immediate path
        let Some(id) = tracking else {
            return;
        };

        if record.level() < self.config.deferred_level() {
            return;
        }

        if self.pool.append(id, record).is_err() {
            self.diagnostics.stale_handle(id, "append");
        }
    }

    fn finish(&self, ctx: &Context, failure: Option<&dyn fmt::Display>) {
        let Some(id) = self.tracking_id(ctx) else {
            return;
        };

        let threshold = self.config.flush_threshold(failure.is_some());

        let released = self.pool.release(id, |records| {
            if let Some(err) = failure {
                debug!(%id, error = %err, buffered = records.len(), "operation failed, unwinding");
            }

            let Some(threshold) = threshold else {
                return;
            };

            for record in records.iter().filter(|r| r.level() >= threshold) {
                self.write(record);
            }
        });

        if !released {
            self.diagnostics.stale_handle(id, "end_tracking");
        }
    }

    fn write(&self, record: &Record) {
        let line = match record.to_bytes() {
            Ok(line) => line,
            Err(e) => {
                self.diagnostics.serialization_failed(&e);
                return;
            }
        };

        if let Err(e) = self.sink.write_line(&line) {
            self.diagnostics.sink_write_failed(&Error::SinkWrite(e));
        }
    }

    fn tracking_id(&self, ctx: &Context) -> Option<TrackingId> {
        ctx.value::<TrackingId>(self.key).copied()
    }
}

impl Default for UnwindLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UnwindLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnwindLogger")
            .field("config", &self.config)
            .field("active_operations", &self.active_operations())
            .field("pool_size", &self.pool_size())
            .finish_non_exhaustive()
    }
}
