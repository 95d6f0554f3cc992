//! In-memory mock driver.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use sqlpool_driver::{
    ConnectionId, Driver, DriverError, OpenMode, RawConnection, RawStatement, Result, StatementId,
    Step,
};

/// Point-in-time snapshot of the mock driver's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Successful opens.
    pub opened: usize,
    /// Opens that were rejected, injected or otherwise.
    pub open_failures: usize,
    /// Successful closes.
    pub closed: usize,
    /// Statements prepared.
    pub prepared: usize,
    /// Statements finalized.
    pub finalized: usize,
}

impl MockStats {
    /// Prepared statements that have not been finalized yet.
    #[must_use]
    pub fn live_statements(&self) -> usize {
        self.prepared - self.finalized
    }
}

#[derive(Default)]
struct Shared {
    next_connection_id: AtomicU64,
    next_statement_id: AtomicU64,
    opened: AtomicUsize,
    open_failures: AtomicUsize,
    closed: AtomicUsize,
    prepared: AtomicUsize,
    finalized: AtomicUsize,
    fail_next_opens: AtomicUsize,
    open_delay: Mutex<Option<Duration>>,
    reset_delay: Mutex<Option<Duration>>,
    databases: Mutex<HashSet<String>>,
    finalized_ids: Mutex<HashSet<StatementId>>,
}

/// Driver whose databases exist only as names in memory.
///
/// Clones share counters and configuration.
#[derive(Clone, Default)]
pub struct MockDriver {
    shared: Arc<Shared>,
}

impl MockDriver {
    /// Create a driver with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to [`Driver::open`] fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.shared.fail_next_opens.store(count, Ordering::SeqCst);
    }

    /// Sleep for `delay` inside every open, to simulate slow connection setup.
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        *self.shared.open_delay.lock() = delay;
    }

    /// Sleep for `delay` inside every statement reset, to widen the window in
    /// which a cached statement is being rewound.
    pub fn set_reset_delay(&self, delay: Option<Duration>) {
        *self.shared.reset_delay.lock() = delay;
    }

    /// Register `target` as an existing database.
    pub fn create_database(&self, target: impl Into<String>) {
        self.shared.databases.lock().insert(target.into());
    }

    /// Current counter values.
    #[must_use]
    pub fn stats(&self) -> MockStats {
        let s = &self.shared;
        MockStats {
            opened: s.opened.load(Ordering::SeqCst),
            open_failures: s.open_failures.load(Ordering::SeqCst),
            closed: s.closed.load(Ordering::SeqCst),
            prepared: s.prepared.load(Ordering::SeqCst),
            finalized: s.finalized.load(Ordering::SeqCst),
        }
    }

    /// Whether the statement with `id` has been finalized.
    #[must_use]
    pub fn is_finalized(&self, id: StatementId) -> bool {
        self.shared.finalized_ids.lock().contains(&id)
    }

    fn reject(&self, target: &str, message: &str) -> DriverError {
        self.shared.open_failures.fetch_add(1, Ordering::SeqCst);
        DriverError::Open {
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    fn take_injected_failure(&self) -> bool {
        self.shared
            .fail_next_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Driver for MockDriver {
    type Connection = MockConnection;

    fn open(&self, target: &str, mode: OpenMode) -> Result<MockConnection> {
        let delay = *self.shared.open_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        if self.take_injected_failure() {
            return Err(self.reject(target, "injected open failure"));
        }

        let exists = target == ":memory:" || self.shared.databases.lock().contains(target);
        if !exists && !mode.may_create() {
            return Err(self.reject(target, "database does not exist"));
        }
        if target != ":memory:" {
            self.shared.databases.lock().insert(target.to_string());
        }

        let id = ConnectionId(self.shared.next_connection_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %id, database = target, ?mode, "mock connection opened");

        Ok(MockConnection {
            id,
            shared: Arc::clone(&self.shared),
            open: true,
            read_only: !mode.is_writable(),
            last_error: None,
        })
    }
}

/// Connection produced by [`MockDriver`].
///
/// Statements starting with `INVALID` (or empty statements) fail to prepare.
/// `SELECT` and `VALUES` statements yield one row; everything else yields none.
pub struct MockConnection {
    id: ConnectionId,
    shared: Arc<Shared>,
    open: bool,
    read_only: bool,
    last_error: Option<String>,
}

impl MockConnection {
    /// Whether this connection was opened read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl RawConnection for MockConnection {
    type Statement = MockStatement;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn prepare(&mut self, sql: &str) -> Result<MockStatement> {
        if !self.open {
            return Err(DriverError::NotOpen);
        }
        let trimmed = sql.trim();
        if trimmed.is_empty() || trimmed.to_ascii_uppercase().starts_with("INVALID") {
            let message = "syntax error".to_string();
            self.last_error = Some(message.clone());
            return Err(DriverError::Prepare {
                sql: sql.to_string(),
                message,
            });
        }

        let upper = trimmed.to_ascii_uppercase();
        let is_query = upper.starts_with("SELECT") || upper.starts_with("VALUES");
        let id = StatementId(self.shared.next_statement_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.shared.prepared.fetch_add(1, Ordering::SeqCst);
        self.last_error = None;

        Ok(MockStatement {
            id,
            owner: self.id,
            sql: sql.to_string(),
            shared: Arc::clone(&self.shared),
            rows: usize::from(is_query),
            position: 0,
            bindings: Vec::new(),
            writes: !is_query,
            read_only: self.read_only,
        })
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(DriverError::NotOpen);
        }
        self.open = false;
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

/// Statement produced by [`MockConnection`].
pub struct MockStatement {
    id: StatementId,
    owner: ConnectionId,
    sql: String,
    shared: Arc<Shared>,
    rows: usize,
    position: usize,
    bindings: Vec<String>,
    writes: bool,
    read_only: bool,
}

impl MockStatement {
    /// Bind a textual parameter value.
    pub fn bind(&mut self, value: impl Into<String>) {
        self.bindings.push(value.into());
    }

    /// Currently bound parameter values.
    #[must_use]
    pub fn bindings(&self) -> &[String] {
        &self.bindings
    }

    /// Whether execution has started and not been reset.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.position > 0
    }
}

impl RawStatement for MockStatement {
    fn id(&self) -> StatementId {
        self.id
    }

    fn owner(&self) -> ConnectionId {
        self.owner
    }

    fn sql(&self) -> &str {
        &self.sql
    }

    fn step(&mut self) -> Result<Step> {
        if self.writes && self.read_only {
            return Err(DriverError::ReadOnly);
        }
        self.position += 1;
        if self.position <= self.rows {
            Ok(Step::Row)
        } else {
            Ok(Step::Done)
        }
    }

    fn reset(&mut self) {
        let delay = *self.shared.reset_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.position = 0;
    }

    fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    fn finalize(&mut self) {
        self.shared.finalized.fetch_add(1, Ordering::SeqCst);
        self.shared.finalized_ids.lock().insert(self.id);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use sqlpool_driver::StatementHandle;

    #[test]
    fn test_open_modes() {
        let driver = MockDriver::new();
        assert!(driver.open("app.db", OpenMode::Existing).is_err());
        assert!(driver.open("app.db", OpenMode::OpenOrCreate).is_ok());
        assert!(driver.open("app.db", OpenMode::Existing).is_ok());
        assert!(driver.open("other.db", OpenMode::ReadOnly).is_err());

        let stats = driver.stats();
        assert_eq!(stats.opened, 2);
        assert_eq!(stats.open_failures, 2);
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let driver = MockDriver::new();
        driver.fail_next_opens(1);
        assert!(driver.open(":memory:", OpenMode::OpenOrCreate).is_err());
        assert!(driver.open(":memory:", OpenMode::OpenOrCreate).is_ok());
    }

    #[test]
    fn test_connection_ids_are_distinct() {
        let driver = MockDriver::new();
        let a = driver.open(":memory:", OpenMode::OpenOrCreate).unwrap();
        let b = driver.open(":memory:", OpenMode::OpenOrCreate).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_statement_lifecycle() {
        let driver = MockDriver::new();
        let mut conn = driver.open(":memory:", OpenMode::OpenOrCreate).unwrap();
        let mut stmt = StatementHandle::new(conn.prepare("SELECT 1;").unwrap());
        let id = stmt.id();

        assert_eq!(stmt.owner(), conn.id());
        assert_eq!(stmt.step().unwrap(), Step::Row);
        assert_eq!(stmt.step().unwrap(), Step::Done);
        assert!(stmt.is_running());
        stmt.rewind();
        assert!(!stmt.is_running());

        drop(stmt);
        assert!(driver.is_finalized(id));
        assert_eq!(driver.stats().live_statements(), 0);
    }

    #[test]
    fn test_invalid_sql_sets_last_error() {
        let driver = MockDriver::new();
        let mut conn = driver.open(":memory:", OpenMode::OpenOrCreate).unwrap();
        assert!(conn.prepare("INVALID STATEMENT").is_err());
        assert_eq!(conn.last_error().as_deref(), Some("syntax error"));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let driver = MockDriver::new();
        driver.create_database("ro.db");
        let mut conn = driver.open("ro.db", OpenMode::ReadOnly).unwrap();
        let mut stmt = conn.prepare("INSERT INTO t VALUES (1);").unwrap();
        assert_eq!(stmt.step(), Err(DriverError::ReadOnly));
    }

    #[test]
    fn test_close_twice_fails() {
        let driver = MockDriver::new();
        let mut conn = driver.open(":memory:", OpenMode::OpenOrCreate).unwrap();
        conn.close().unwrap();
        assert_eq!(conn.close(), Err(DriverError::NotOpen));
        assert!(conn.prepare("SELECT 1;").is_err());
    }
}
