//! Prepared statement traits and the owning statement handle.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::Result;
use crate::connection::ConnectionId;

/// Identity of one prepared statement, unique per driver instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementId(pub u64);

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

/// Outcome of advancing a statement by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A result row is available.
    Row,
    /// The statement ran to completion.
    Done,
}

/// A compiled statement as exposed by a driver.
///
/// `finalize` is called exactly once, by [`StatementHandle`]'s destructor.
pub trait RawStatement: Send + 'static {
    /// Identity of this statement.
    fn id(&self) -> StatementId;

    /// Connection that prepared this statement.
    fn owner(&self) -> ConnectionId;

    /// SQL text the statement was prepared from.
    fn sql(&self) -> &str;

    /// Advance execution by one step.
    fn step(&mut self) -> Result<Step>;

    /// Rewind execution to the beginning, keeping bound parameters.
    fn reset(&mut self);

    /// Drop every bound parameter value.
    fn clear_bindings(&mut self);

    /// Release the driver resources behind this statement.
    fn finalize(&mut self);
}

/// Owning handle to a prepared statement.
///
/// Dropping the handle finalizes the statement. Handles are moved, never
/// shared, so a statement is finalized exactly once.
pub struct StatementHandle<S: RawStatement> {
    raw: S,
}

impl<S: RawStatement> StatementHandle<S> {
    /// Take ownership of a freshly prepared statement.
    #[must_use]
    pub fn new(raw: S) -> Self {
        Self { raw }
    }

    /// Reset execution state and clear bindings, leaving the statement ready
    /// to be bound and run again.
    pub fn rewind(&mut self) {
        self.raw.reset();
        self.raw.clear_bindings();
    }
}

impl<S: RawStatement> Deref for StatementHandle<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.raw
    }
}

impl<S: RawStatement> DerefMut for StatementHandle<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.raw
    }
}

impl<S: RawStatement> Drop for StatementHandle<S> {
    fn drop(&mut self) {
        tracing::trace!(
            statement_id = %self.raw.id(),
            connection_id = %self.raw.owner(),
            "finalizing statement"
        );
        self.raw.finalize();
    }
}

impl<S: RawStatement> fmt::Debug for StatementHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementHandle")
            .field("id", &self.raw.id())
            .field("owner", &self.raw.owner())
            .field("sql", &self.raw.sql())
            .finish()
    }
}
