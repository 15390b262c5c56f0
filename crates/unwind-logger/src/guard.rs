//! Scoped tracking

use crate::context::Context;
use crate::entry::Entry;
use crate::logger::UnwindLogger;

use std::fmt;

/// Guard that ends a tracked operation on every exit path.
///
/// Finish it with [`succeed`](Self::succeed), [`fail`](Self::fail) or
/// [`finish`](Self::finish). A guard dropped unfinished ends the operation as a
/// success, or as a failure if the thread is panicking.
#[must_use = "dropping the guard ends tracking immediately"]
#[derive(Debug)]
pub struct TrackingGuard<'a> {
    logger: &'a UnwindLogger,
    context: Context,
    finished: bool,
}

impl<'a> TrackingGuard<'a> {
    pub(crate) fn new(logger: &'a UnwindLogger, context: Context) -> Self {
        Self {
            logger,
            context,
            finished: false,
        }
    }

    /// Context carrying the operation's handle
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Build a record bound to this operation
    pub fn entry(&self) -> Entry<'a> {
        self.logger.with_context(&self.context)
    }

    /// End the operation as a success
    pub fn succeed(mut self) {
        self.finished = true;
        self.logger.end_tracking(&self.context);
    }

    /// End the operation as a failure
    pub fn fail<E: fmt::Display + ?Sized>(mut self, err: &E) {
        self.finished = true;
        self.logger.end_tracking_with_error(&self.context, err);
    }

    /// End the operation according to its result
    pub fn finish<T, E: fmt::Display>(mut self, outcome: &Result<T, E>) {
        self.finished = true;
        self.logger.end_tracking_with_outcome(&self.context, outcome);
    }
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if std::thread::panicking() {
            self.logger.end_tracking_with_error(&self.context, "panicked");
        } else {
            self.logger.end_tracking(&self.context);
        }
    }
}
