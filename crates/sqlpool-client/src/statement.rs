//! Prepared statement borrowed from a connection.

use std::fmt;

use sqlpool_driver::{RawConnection, RawStatement, StatementHandle, StatementId, Step};

use crate::connection::Connection;
use crate::error::Result;

/// A prepared statement checked out of a [`Connection`].
///
/// When dropped, the statement goes back to the connection's cache, unless it
/// is a schema-changing statement or the schema changed while it was checked
/// out, in which case it is finalized.
pub struct Statement<'c, C: RawConnection> {
    conn: &'c Connection<C>,
    sql: String,
    /// `Some` until `Drop` hands the statement back to the connection.
    handle: Option<StatementHandle<C::Statement>>,
    cacheable: bool,
    generation: u64,
}

impl<'c, C: RawConnection> Statement<'c, C> {
    pub(crate) fn new(
        conn: &'c Connection<C>,
        sql: &str,
        handle: StatementHandle<C::Statement>,
        cacheable: bool,
        generation: u64,
    ) -> Self {
        Self {
            conn,
            sql: sql.to_string(),
            handle: Some(handle),
            cacheable,
            generation,
        }
    }

    /// SQL text this statement was prepared from.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Identity of the prepared statement.
    #[must_use]
    pub fn id(&self) -> StatementId {
        self.raw().id()
    }

    /// Whether this statement will be offered back to the cache on drop.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Advance execution by one step.
    pub fn step(&mut self) -> Result<Step> {
        Ok(self.raw_mut().step()?)
    }

    /// Rewind execution and clear bound parameters.
    pub fn rewind(&mut self) {
        self.handle_mut().rewind();
    }

    /// The driver statement, for binding parameters and reading columns.
    #[must_use]
    pub fn raw(&self) -> &C::Statement {
        match self.handle.as_ref() {
            Some(handle) => &**handle,
            None => unreachable!("statement handle is only taken on drop"),
        }
    }

    /// Mutable access to the driver statement.
    pub fn raw_mut(&mut self) -> &mut C::Statement {
        &mut **self.handle_mut()
    }

    /// Finalize the statement now instead of returning it to the cache.
    pub fn finalize(mut self) {
        self.cacheable = false;
    }

    fn handle_mut(&mut self) -> &mut StatementHandle<C::Statement> {
        match self.handle.as_mut() {
            Some(handle) => handle,
            None => unreachable!("statement handle is only taken on drop"),
        }
    }
}

impl<C: RawConnection> Drop for Statement<'_, C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.conn.recycle(&self.sql, handle, self.cacheable, self.generation);
        }
    }
}

impl<C: RawConnection> fmt::Debug for Statement<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("id", &self.id())
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use crate::{Connection, ConnectionConfig};
    use sqlpool_driver::Step;
    use sqlpool_testing::MockDriver;

    #[test]
    fn test_finalize_skips_cache() {
        let driver = MockDriver::new();
        let conn = Connection::open(&driver, ":memory:", ConnectionConfig::new()).unwrap();

        let stmt = conn.prepare("SELECT 1;").unwrap();
        let id = stmt.id();
        stmt.finalize();

        assert!(conn.statement_cache().is_empty());
        assert!(driver.is_finalized(id));
    }

    #[test]
    fn test_schema_statement_is_not_cacheable() {
        let driver = MockDriver::new();
        let conn = Connection::open(&driver, ":memory:", ConnectionConfig::new()).unwrap();
        let stmt = conn.prepare("CREATE TABLE t (x);").unwrap();
        assert!(!stmt.is_cacheable());
    }

    #[test]
    fn test_bindings_cleared_on_reuse() {
        let driver = MockDriver::new();
        let conn = Connection::open(&driver, ":memory:", ConnectionConfig::new()).unwrap();
        {
            let mut stmt = conn.prepare("SELECT ?;").unwrap();
            stmt.raw_mut().bind("x");
            assert_eq!(stmt.step().unwrap(), Step::Row);
        }
        let stmt = conn.prepare("SELECT ?;").unwrap();
        assert!(stmt.raw().bindings().is_empty());
        assert!(!stmt.raw().is_running());
    }

    #[test]
    fn test_rewind_restarts_execution() {
        let driver = MockDriver::new();
        let conn = Connection::open(&driver, ":memory:", ConnectionConfig::new()).unwrap();
        let mut stmt = conn.prepare("SELECT 1;").unwrap();
        assert_eq!(stmt.step().unwrap(), Step::Row);
        assert_eq!(stmt.step().unwrap(), Step::Done);
        stmt.rewind();
        assert_eq!(stmt.step().unwrap(), Step::Row);
    }
}
