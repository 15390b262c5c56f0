//! Record builder bound to a logger

use crate::level::Level;
use crate::logger::UnwindLogger;
use crate::pool::TrackingId;
use crate::record::Record;

use std::fmt;

use serde::Serialize;

/// A record under construction.
///
/// Attach fields, then finish with [`Entry::log`] or one of the per-level
/// helpers, which hand the record to the logger for routing.
#[must_use = "an entry does nothing until it is logged"]
#[derive(Debug)]
pub struct Entry<'a> {
    logger: &'a UnwindLogger,
    tracking: Option<TrackingId>,
    record: Record,
}

impl<'a> Entry<'a> {
    pub(crate) fn new(logger: &'a UnwindLogger, tracking: Option<TrackingId>) -> Self {
        Self {
            logger,
            tracking,
            record: Record::new(),
        }
    }

    /// Attach a field; absent values (`None`) are ignored
    pub fn with_field<V: Serialize>(mut self, key: impl Into<String>, value: V) -> Self {
        self.record.insert_field(key, value);
        self
    }

    /// Attach an error as the `error` field
    pub fn with_error<E: fmt::Display + ?Sized>(self, err: &E) -> Self {
        self.with_field(crate::record::ERROR_KEY, err.to_string())
    }

    /// Handle of the operation this entry belongs to, if any
    #[must_use]
    pub const fn tracking_id(&self) -> Option<TrackingId> {
        self.tracking
    }

    /// Finalize the record and route it
    pub fn log(self, level: Level, message: impl Into<String>) {
        let record = self.record.finalize(level, message);
        self.logger.dispatch(record, self.tracking);
    }

    /// Log at trace level
    #[inline]
    pub fn trace(self, message: impl Into<String>) {
        self.log(Level::TRACE, message);
    }

    /// Log at debug level
    #[inline]
    pub fn debug(self, message: impl Into<String>) {
        self.log(Level::DEBUG, message);
    }

    /// Log info
    #[inline]
    pub fn info(self, message: impl Into<String>) {
        self.log(Level::INFO, message);
    }

    /// Log a warning
    #[inline]
    pub fn warn(self, message: impl Into<String>) {
        self.log(Level::WARN, message);
    }

    /// Log an error
    #[inline]
    pub fn error(self, message: impl Into<String>) {
        self.log(Level::ERROR, message);
    }

    /// Log at critical level
    #[inline]
    pub fn critical(self, message: impl Into<String>) {
        self.log(Level::CRITICAL, message);
    }
}
