//! # sqlpool-client
//!
//! Connection wrapper with a built-in prepared statement cache.
//!
//! A [`Connection`] owns one raw driver connection plus a [`StatementCache`]
//! keyed by SQL text. Preparing the same SQL twice on a connection reuses the
//! compiled statement instead of compiling it again.
//!
//! ## Features
//!
//! - **LRU eviction**: the cache is bounded and evicts the least recently used
//!   statement first
//! - **Schema awareness**: preparing `CREATE`, `DROP`, `ALTER`, `ATTACH` or
//!   `DETACH` empties the cache, and such statements are never cached
//! - **Clean reuse**: statements served from the cache are reset and have their
//!   bindings cleared
//! - **Thread-safe**: a connection can be shared by reference across threads;
//!   the raw handle and the cache are each guarded by their own lock
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlpool_client::{Connection, ConnectionConfig, StatementCacheConfig};
//!
//! let config = ConnectionConfig::new()
//!     .statement_cache(StatementCacheConfig::new().capacity(64));
//! let conn = Connection::open(&driver, "app.db", config)?;
//!
//! conn.execute("CREATE TABLE t (id INTEGER);")?;
//! {
//!     let mut stmt = conn.prepare("SELECT id FROM t;")?;
//!     while stmt.step()? == Step::Row {
//!         // read columns...
//!     }
//! } // statement goes back to the cache here
//!
//! let stats = conn.statement_cache().stats();
//! println!("hit rate: {:.2}", stats.hit_rate());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod schema;
pub mod statement;

pub use cache::{CacheStats, StatementCache};
pub use config::{ConnectionConfig, StatementCacheConfig};
pub use connection::Connection;
pub use error::{Error, Result};
pub use schema::is_schema_changing;
pub use statement::Statement;

pub use sqlpool_driver::{Driver, DriverError, OpenMode, RawConnection, RawStatement, Step};
