//! Driver-level error types.

use thiserror::Error;

/// Errors reported by a database driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DriverError {
    /// The database could not be opened.
    #[error("could not open database '{target}': {message}")]
    Open {
        /// Identifier that was passed to the driver.
        target: String,
        /// Driver-provided reason.
        message: String,
    },

    /// The connection has already been closed.
    #[error("database is not open")]
    NotOpen,

    /// Statement preparation failed.
    #[error("failed to prepare '{sql}': {message}")]
    Prepare {
        /// SQL text that failed to prepare.
        sql: String,
        /// Driver-provided reason.
        message: String,
    },

    /// Stepping a prepared statement failed.
    #[error("statement execution failed: {message}")]
    Step {
        /// Driver-provided reason.
        message: String,
    },

    /// Closing the connection failed.
    #[error("failed to close database: {message}")]
    Close {
        /// Driver-provided reason.
        message: String,
    },

    /// A write was attempted on a read-only connection.
    #[error("attempt to write a read-only database")]
    ReadOnly,
}

impl DriverError {
    /// Whether retrying the same operation on a fresh connection might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::NotOpen)
    }
}
