//! Error types for halaman.

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the cache core.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad input: page < 1, empty page set, zero page size, prefetch ranges
    /// out of bounds.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A filter was built against a field with no registered resolver.
    #[error("no resolver registered for field `{0}`")]
    UnknownField(String),

    /// A resolver produced a value the field filter cannot compare.
    #[error("field `{field}` resolved to {found}, filter expects {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The data source failed while serving a page request.
    #[error("source failure: {0}")]
    Source(String),

    /// A snapshot part is corrupt or inconsistent and cannot be restored.
    #[error("corrupt snapshot: {0}")]
    Snapshot(String),
}

impl Error {
    /// Create an invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a source-failure error. Data sources wrap their own failures
    /// with this before returning them through `request_page`.
    pub fn source_failure(msg: impl Into<String>) -> Self {
        Error::Source(msg.into())
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Error::Snapshot(msg.into())
    }
}
