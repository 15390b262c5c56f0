//! Error types for the unwind logger

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering or writing log records
#[derive(Debug, Error)]
pub enum Error {
    /// A field value could not be represented as JSON
    #[error("Failed to serialize field `{field}`: {reason}")]
    Serialization {
        /// Name of the offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The assembled record could not be encoded
    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink rejected or failed a write
    #[error("Sink write failed: {0}")]
    SinkWrite(#[from] std::io::Error),

    /// Text that does not name a level
    #[error("Invalid level: {0}")]
    InvalidLevel(String),
}
