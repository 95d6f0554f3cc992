//! # sqlpool-pool
//!
//! Bounded connection pool with exclusive and shared leases.
//!
//! Connections are created lazily by a factory, up to a fixed capacity. Callers
//! that find the pool full block until a lease comes back. A failed creation
//! gives its slot back, so errors never shrink the pool.
//!
//! ## Features
//!
//! - Lazy creation with optional warm-up of `min_connections`
//! - Blocking, timed, non-blocking and async acquisition
//! - Shared aliases that keep a connection leased until the last one drops
//! - LIFO reuse of idle connections, keeping warm statement caches in use
//! - Status and metrics snapshots
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlpool_pool::{ConnectionPool, Pool, connection_factory};
//! use sqlpool_client::ConnectionConfig;
//!
//! let pool: ConnectionPool<MyDriver> = Pool::builder()
//!     .min_connections(2)
//!     .max_connections(8)
//!     .factory(connection_factory(driver, "app.db", ConnectionConfig::new()))
//!     .build()?;
//!
//! let conn = pool.acquire()?;
//! conn.execute("INSERT INTO log VALUES ('started');")?;
//!
//! // Keep the connection around with other long-lived state
//! let shared = conn.into_shared();
//! let worker_copy = shared.clone();
//!
//! let status = pool.status();
//! println!("Pool utilization: {:.1}%", status.utilization());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod factory;
pub mod lease;
pub mod pool;

// Configuration
pub use config::PoolConfig;

// Error types
pub use error::{BoxError, PoolError};

// Pool types
pub use pool::{Pool, PoolBuilder, PoolMetrics, PoolStatus};

// Leases
pub use lease::{ConnectionMetadata, PooledConnection, SharedConnection};

// Client connections
pub use factory::{ConnectionPool, connection_factory};
