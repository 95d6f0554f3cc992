//! # sqlpool-driver
//!
//! Driver abstraction for the database connections managed by `sqlpool`.
//!
//! The pool and the statement cache never talk to a database library directly.
//! Instead, a backend implements three small traits:
//!
//! - [`Driver`] opens connections for a target identifier and [`OpenMode`]
//! - [`RawConnection`] prepares statements and closes itself
//! - [`RawStatement`] steps, resets and finalizes one prepared statement
//!
//! A raw connection is not assumed to be thread-safe. Callers serialize access
//! to it, either through a pool lease or through the connection wrapper in
//! `sqlpool-client`.
//!
//! Prepared statements are always held through a [`StatementHandle`], which
//! finalizes the statement when dropped. There is exactly one owner of a
//! prepared statement at any time.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod connection;
pub mod error;
pub mod statement;

pub use connection::{ConnectionId, Driver, OpenMode, RawConnection};
pub use error::DriverError;
pub use statement::{RawStatement, StatementHandle, StatementId, Step};

/// Result alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;
