//! Error types for the filter policy bridge.

use thiserror::Error;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for filter policy operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An identifier with no registry entry reached the bridge.
    #[error("Unknown filter handler id: {0}")]
    UnknownHandler(usize),

    /// User handler code panicked inside a bridge call.
    #[error("Filter handler {id} panicked in {operation}: {message}")]
    HandlerPanicked {
        /// Registry id of the handler.
        id: usize,
        /// Bridge operation that was running.
        operation: &'static str,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// A handler name cannot be encoded as a C string.
    #[error("Invalid policy name: {0}")]
    InvalidName(String),

    /// The policy handle was already destroyed.
    #[error("Filter policy has been destroyed")]
    PolicyDestroyed,

    /// Data corruption was detected.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
