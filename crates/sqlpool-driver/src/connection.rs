//! Connection-side driver traits.

use std::fmt;

use crate::Result;
use crate::statement::RawStatement;

/// Opaque identity of an open raw connection.
///
/// Statements remember the identity of the connection that prepared them, which
/// lets a cache detect handles that leaked in from another connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// How a driver should behave when opening a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OpenMode {
    /// Open an existing database for reads only, fail when it is missing.
    ReadOnly,
    /// Open an existing database, fail when it is missing.
    Existing,
    /// Open an existing database or create it on demand.
    #[default]
    OpenOrCreate,
    /// Discard any existing database and create a fresh one.
    AlwaysCreate,
}

impl OpenMode {
    /// Whether connections opened in this mode accept writes.
    #[must_use]
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }

    /// Whether opening in this mode may create the database.
    #[must_use]
    pub fn may_create(self) -> bool {
        matches!(self, Self::OpenOrCreate | Self::AlwaysCreate)
    }
}

/// Factory for raw connections.
pub trait Driver: Send + Sync + 'static {
    /// Connection type produced by this driver.
    type Connection: RawConnection;

    /// Open a connection to `target` using `mode`.
    fn open(&self, target: &str, mode: OpenMode) -> Result<Self::Connection>;
}

/// A single open database handle.
///
/// Implementations need not be thread-safe beyond `Send`: the owner hands out
/// exclusive access one caller at a time.
pub trait RawConnection: Send + 'static {
    /// Prepared statement type produced by this connection.
    type Statement: RawStatement;

    /// Identity of this connection.
    fn id(&self) -> ConnectionId;

    /// Compile `sql` into a fresh prepared statement.
    fn prepare(&mut self, sql: &str) -> Result<Self::Statement>;

    /// Close the handle. Further calls fail with [`DriverError::NotOpen`](crate::DriverError::NotOpen).
    fn close(&mut self) -> Result<()>;

    /// Whether the handle is still open.
    fn is_open(&self) -> bool;

    /// Message of the most recent failure on this handle, if any.
    fn last_error(&self) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_default() {
        assert_eq!(OpenMode::default(), OpenMode::OpenOrCreate);
    }

    #[test]
    fn test_open_mode_flags() {
        assert!(!OpenMode::ReadOnly.is_writable());
        assert!(OpenMode::Existing.is_writable());
        assert!(!OpenMode::Existing.may_create());
        assert!(OpenMode::AlwaysCreate.may_create());
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId(7).to_string(), "conn#7");
    }
}
