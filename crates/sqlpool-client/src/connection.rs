//! Database connection with statement caching.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use sqlpool_driver::{ConnectionId, Driver, RawConnection, StatementHandle, Step};

use crate::cache::StatementCache;
use crate::config::{ConnectionConfig, StatementCacheConfig};
use crate::error::{Error, Result};
use crate::schema::is_schema_changing;
use crate::statement::Statement;

/// An open database connection and its prepared statement cache.
///
/// Methods take `&self`: the raw handle and the cache sit behind separate
/// locks, so several threads holding the same connection (for example through
/// a shared pool lease) can prepare statements concurrently.
///
/// Dropping the connection finalizes every cached statement and closes the
/// raw handle.
pub struct Connection<C: RawConnection> {
    id: ConnectionId,
    raw: Mutex<C>,
    cache: StatementCache<C::Statement>,
    /// Bumped on every schema change. Statements checked out under an older
    /// generation are finalized instead of being cached again.
    schema_generation: AtomicU64,
}

impl<C: RawConnection> Connection<C> {
    /// Open `target` through `driver`.
    pub fn open<D>(driver: &D, target: &str, config: ConnectionConfig) -> Result<Self>
    where
        D: Driver<Connection = C>,
    {
        tracing::debug!(database = target, mode = ?config.open_mode, "opening connection");
        let raw = driver.open(target, config.open_mode)?;
        Ok(Self::from_raw(raw, config.statement_cache))
    }

    /// Wrap an already open raw connection.
    #[must_use]
    pub fn from_raw(raw: C, cache: StatementCacheConfig) -> Self {
        Self {
            id: raw.id(),
            raw: Mutex::new(raw),
            cache: StatementCache::new(cache),
            schema_generation: AtomicU64::new(0),
        }
    }

    /// Identity of the underlying raw connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Prepare `sql`, reusing a cached statement when one is available.
    ///
    /// Schema-changing statements empty the cache first and are always
    /// prepared fresh; they are finalized when the returned statement drops.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_, C>> {
        if !self.is_open() {
            return Err(Error::Closed);
        }

        // Read before the cache lookup; any schema change after this point
        // makes the returned statement stale.
        let generation = self.generation();
        let schema_change = is_schema_changing(sql);
        if schema_change {
            self.schema_generation.fetch_add(1, Ordering::AcqRel);
            let dropped = self.cache.clear();
            tracing::debug!(
                connection_id = %self.id,
                sql,
                dropped,
                "schema change, statement cache invalidated"
            );
        } else if let Some(handle) = self.cache.acquire(self.id, sql) {
            return Ok(Statement::new(self, sql, handle, true, generation));
        }

        let raw = {
            let mut conn = self.raw.lock();
            if !conn.is_open() {
                return Err(Error::Closed);
            }
            conn.prepare(sql)?
        };
        Ok(Statement::new(
            self,
            sql,
            StatementHandle::new(raw),
            !schema_change,
            generation,
        ))
    }

    /// Prepare and run `sql` to completion, returning the number of rows it
    /// produced.
    pub fn execute(&self, sql: &str) -> Result<usize> {
        let mut stmt = self.prepare(sql)?;
        let mut rows = 0;
        while stmt.step()? == Step::Row {
            rows += 1;
        }
        Ok(rows)
    }

    /// The statement cache owned by this connection.
    #[must_use]
    pub fn statement_cache(&self) -> &StatementCache<C::Statement> {
        &self.cache
    }

    /// Replace the statement cache configuration. Cached statements are
    /// finalized.
    pub fn configure_statement_cache(&self, config: StatementCacheConfig) {
        self.cache.reconfigure(config);
    }

    /// Current statement cache configuration.
    #[must_use]
    pub fn statement_cache_config(&self) -> StatementCacheConfig {
        self.cache.config()
    }

    /// Finalize every cached statement.
    pub fn clear_statement_cache(&self) {
        self.cache.clear();
    }

    /// Whether the raw handle is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.raw.lock().is_open()
    }

    /// Message of the most recent driver failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.raw.lock().last_error()
    }

    /// Run `f` with exclusive access to the raw driver connection.
    pub fn with_raw<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.raw.lock())
    }

    /// Close the connection, reporting any driver failure.
    pub fn close(self) -> Result<()> {
        self.shutdown()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.schema_generation.load(Ordering::Acquire)
    }

    /// Return a statement after use.
    pub(crate) fn recycle(
        &self,
        sql: &str,
        handle: StatementHandle<C::Statement>,
        cacheable: bool,
        generation: u64,
    ) {
        if cacheable && generation == self.generation() && self.is_open() {
            self.cache.release(sql, handle);
        } else {
            drop(handle);
        }
    }

    fn shutdown(&self) -> Result<()> {
        self.cache.clear();
        let mut raw = self.raw.lock();
        if !raw.is_open() {
            return Ok(());
        }
        raw.close()?;
        tracing::debug!(connection_id = %self.id, "connection closed");
        Ok(())
    }
}

impl<C: RawConnection> Drop for Connection<C> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(connection_id = %self.id, error = %e, "failed to close connection");
        }
    }
}

impl<C: RawConnection> fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("cache", &self.cache)
            .finish()
    }
}
