//! Structured logger that defers the records of an operation until its outcome is known
//!
//! Records logged while an operation is tracked are buffered per operation.
//! When the operation ends, a failure "unwinds" the buffered context into the
//! output; a success discards it. Severe records can still be written
//! immediately, and records belonging to no operation always are.
//!
//! ```
//! use proven_unwind_logger::{CaptureSink, Context, Level, UnwindLogger};
//!
//! let capture = CaptureSink::new();
//! let logger = UnwindLogger::new()
//!     .with_immediate_level(Level::WARN)
//!     .with_deferred_level(Level::INFO)
//!     .with_sink(capture.clone());
//!
//! let ctx = logger.start_tracking(&Context::background());
//! logger.with_context(&ctx).with_field("user", "alice").info("loading profile");
//! logger.end_tracking_with_error(&ctx, "profile not found");
//!
//! assert!(capture.contains("loading profile"));
//! ```
#![warn(missing_docs, unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod config;
mod context;
mod diagnostics;
mod entry;
mod error;
mod finite;
mod guard;
mod level;
mod logger;
mod pool;
mod record;
mod sink;

pub use config::{UnwindLoggerConfig, UnwindLoggerConfigBuilder};
pub use context::{Context, ContextKey};
pub use diagnostics::DiagnosticsSnapshot;
pub use entry::Entry;
pub use error::{Error, Result};
pub use guard::TrackingGuard;
pub use level::Level;
pub use logger::UnwindLogger;
pub use pool::TrackingId;
pub use record::{ERROR_KEY, LEVEL_KEY, MESSAGE_KEY, Record, TIME_KEY, format_timestamp};
pub use sink::{CaptureSink, LogSink, StdoutSink, WriterSink};
