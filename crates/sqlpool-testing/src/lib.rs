//! # sqlpool-testing
//!
//! Test infrastructure for sqlpool development.
//!
//! [`MockDriver`] is an in-memory [`Driver`](sqlpool_driver::Driver) whose
//! connections and statements record every open, close, prepare and finalize
//! in shared counters. Tests use it to observe what the pool and the statement
//! cache did without a real database.
//!
//! ## Example
//!
//! ```rust
//! use sqlpool_driver::{Driver, OpenMode, RawConnection};
//! use sqlpool_testing::MockDriver;
//!
//! let driver = MockDriver::new();
//! let mut conn = driver.open(":memory:", OpenMode::OpenOrCreate).unwrap();
//! let stmt = conn.prepare("SELECT 1;").unwrap();
//! drop(stmt);
//! assert_eq!(driver.stats().prepared, 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock;

pub use mock::{MockConnection, MockDriver, MockStatement, MockStats};
