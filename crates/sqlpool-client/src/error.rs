//! Client error types.

use sqlpool_driver::DriverError;
use thiserror::Error;

/// Errors returned by [`Connection`](crate::Connection) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The underlying driver reported a failure.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// The connection has been closed.
    #[error("connection is closed")]
    Closed,
}

impl Error {
    /// Whether retrying on a fresh connection might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Driver(e) => e.is_transient(),
            Self::Closed => true,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
