//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by a connection factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while building or using a pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Invalid pool configuration.
    #[error("invalid pool configuration: {0}")]
    Config(String),

    /// The connection factory failed to create a connection.
    #[error("failed to create connection: {0}")]
    Factory(#[source] BoxError),

    /// Timed out waiting for a connection.
    #[error("timed out after {0:?} waiting for a connection")]
    Timeout(Duration),

    /// The pool has been closed.
    #[error("pool is closed")]
    PoolClosed,

    /// The background task running a blocking acquire did not complete.
    #[error("acquire task failed: {0}")]
    Join(String),
}

impl PoolError {
    /// Whether the same call may succeed if retried later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Factory(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_factory_error_keeps_source() {
        let source: BoxError = "disk full".into();
        let err = PoolError::Factory(source);
        assert_eq!(err.to_string(), "failed to create connection: disk full");
        assert!(err.source().is_some());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_error_not_retryable() {
        assert!(!PoolError::Config("zero".into()).is_retryable());
        assert!(!PoolError::PoolClosed.is_retryable());
    }
}
