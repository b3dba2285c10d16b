//! Error types for live-timing ingestion.
//!
//! All errors implement `std::error::Error` and carry enough context to be
//! logged and acted on without inspecting the feed.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: the raw source could not be reached or closed early.
//!   These are fatal to a session and surface from the start call.
//! - **File Errors**: archive files that cannot be opened, read or written
//! - **Parse Errors**: a malformed field inside one fragment. Local to that
//!   fragment; the field keeps its previous value.
//! - **Unknown Variant Errors**: the feed sent an enumeration value we do not
//!   know (session name, status, flag, compound, ...). Recoverable.
//! - **Decode Errors**: the payload itself is not valid JSON / base64 / deflate
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use paddock::TimingError;
//!
//! let error = TimingError::connection_failed("feed endpoint refused connection");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::Category;

/// Result type alias for live-timing operations.
pub type Result<T, E = TimingError> = std::result::Result<T, E>;

/// Main error type for live-timing operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TimingError {
    #[error("Failed to connect to timing source: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Archive file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {category} at {timestamp}: field '{field}': {details}")]
    Parse { category: Category, timestamp: String, field: String, details: String },

    #[error("Unknown {kind} value '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Failed to decode {category} payload: {details}")]
    Decode { category: Category, details: String },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Output queue '{queue}' is closed")]
    QueueClosed { queue: &'static str },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl TimingError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TimingError::Connection { .. } => true,
            TimingError::Timeout { .. } => true,
            TimingError::File { .. } => false,
            TimingError::Parse { .. } => false,
            TimingError::UnknownVariant { .. } => false,
            TimingError::Decode { .. } => false,
            TimingError::Config { .. } => false,
            TimingError::QueueClosed { .. } => false,
        }
    }

    /// Returns true for errors that only affect a single fragment.
    ///
    /// The parser reports these alongside whatever it could still decode and
    /// keeps processing the stream.
    pub fn is_fragment_local(&self) -> bool {
        matches!(
            self,
            TimingError::Parse { .. } | TimingError::UnknownVariant { .. } | TimingError::Decode { .. }
        )
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TimingError::Connection { .. } => vec![
                "Check the session is live or the archive is published",
                "Verify network connectivity to the timing endpoint",
                "Retry the connection after a short delay",
            ],
            TimingError::File { .. } => vec![
                "Check the archive file exists and is readable",
                "Verify the archive uses the name/payload/timestamp line format",
                "Check directory permissions for archive capture",
            ],
            TimingError::Parse { .. } => vec![
                "Inspect the raw fragment for the reported field",
                "The previous value of the field is kept",
            ],
            TimingError::UnknownVariant { .. } => vec![
                "The feed may have added a new value; update the mapping",
                "The previous value is kept until a known value arrives",
            ],
            TimingError::Decode { .. } => vec![
                "Verify the payload is JSON or base64 raw-deflate JSON",
                "Check the archive was not truncated mid-record",
            ],
            TimingError::Config { .. } => vec![
                "Check the YAML keys and value types",
                "Remove the key to fall back to the default",
            ],
            TimingError::QueueClosed { .. } => {
                vec!["The session was closed; open a new session to keep receiving data"]
            }
            TimingError::Timeout { .. } => {
                vec!["Increase the timeout duration", "Check the source is still producing data"]
            }
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TimingError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TimingError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TimingError::File { path: path.into(), source }
    }

    /// Helper constructor for a malformed field inside a fragment.
    pub fn parse_error(
        category: Category,
        timestamp: impl Into<String>,
        field: impl Into<String>,
        details: impl ToString,
    ) -> Self {
        TimingError::Parse {
            category,
            timestamp: timestamp.into(),
            field: field.into(),
            details: details.to_string(),
        }
    }

    /// Helper constructor for enumeration values the library does not know.
    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        TimingError::UnknownVariant { kind, value: value.into() }
    }

    /// Helper constructor for undecodable payloads.
    pub fn decode_error(category: Category, details: impl ToString) -> Self {
        TimingError::Decode { category, details: details.to_string() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(details: impl ToString) -> Self {
        TimingError::Config { details: details.to_string() }
    }
}

impl From<std::io::Error> for TimingError {
    fn from(err: std::io::Error) -> Self {
        TimingError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for TimingError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TimingError::config_error(err)
    }
}
