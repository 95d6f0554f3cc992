//! Leases handed out by the pool.
//!
//! A lease episode starts when a connection is checked out and ends when the
//! last handle referring to it is dropped. Both handle types hold a strong
//! reference to the same [`Episode`], and only the episode's `Drop` puts the
//! connection back.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;

use crate::pool::{Idle, PoolInner};

/// Bookkeeping carried by every pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionMetadata {
    /// Pool-assigned identifier, unique within one pool.
    pub id: u64,
    /// When the factory created the connection.
    pub created_at: Instant,
    /// When the connection was last handed out.
    pub last_checkout: Option<Instant>,
    /// How many times the connection has been handed out.
    pub checkouts: u64,
}

impl ConnectionMetadata {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            last_checkout: None,
            checkouts: 0,
        }
    }

    pub(crate) fn record_checkout(&mut self) {
        self.last_checkout = Some(Instant::now());
        self.checkouts += 1;
    }

    /// Time since the connection was created.
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// One checkout of a pooled connection.
///
/// `conn` is `Some` for as long as the episode is reachable. It is taken only
/// by `Drop` and by [`PooledConnection::detach`], and both consume the
/// episode, so the accessors below never observe `None`.
struct Episode<C> {
    conn: Option<C>,
    metadata: ConnectionMetadata,
    pool: Arc<PoolInner<C>>,
}

impl<C> Episode<C> {
    fn conn(&self) -> &C {
        match self.conn.as_ref() {
            Some(conn) => conn,
            None => unreachable!("connection is only taken when the episode ends"),
        }
    }

    fn conn_mut(&mut self) -> &mut C {
        match self.conn.as_mut() {
            Some(conn) => conn,
            None => unreachable!("connection is only taken when the episode ends"),
        }
    }
}

impl<C> Drop for Episode<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(Idle {
                conn,
                metadata: self.metadata,
            });
        }
    }
}

/// A connection retrieved from the pool.
///
/// When dropped, the connection is automatically returned to the pool, unless
/// [`shared`](PooledConnection::shared) aliases are still alive; then the
/// return happens when the last alias goes away.
pub struct PooledConnection<C> {
    episode: Arc<Episode<C>>,
}

impl<C> PooledConnection<C> {
    pub(crate) fn new(conn: C, metadata: ConnectionMetadata, pool: Arc<PoolInner<C>>) -> Self {
        Self {
            episode: Arc::new(Episode {
                conn: Some(conn),
                metadata,
                pool,
            }),
        }
    }

    /// Get the connection metadata.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.episode.metadata
    }

    /// Create a cloneable alias that keeps the connection leased.
    #[must_use]
    pub fn shared(&self) -> SharedConnection<C> {
        SharedConnection {
            episode: Arc::clone(&self.episode),
        }
    }

    /// Turn this lease into a cloneable alias.
    #[must_use]
    pub fn into_shared(self) -> SharedConnection<C> {
        SharedConnection {
            episode: self.episode,
        }
    }

    /// Mutable access to the connection, available only while no alias exists.
    pub fn get_mut(&mut self) -> Option<&mut C> {
        Arc::get_mut(&mut self.episode).map(Episode::conn_mut)
    }

    /// Number of live handles for this episode, this one included.
    #[must_use]
    pub fn alias_count(&self) -> usize {
        Arc::strong_count(&self.episode)
    }

    /// Detach the connection from the pool.
    ///
    /// The pool forgets the connection and frees its slot. Fails, handing the
    /// lease back, while shared aliases are alive.
    pub fn detach(self) -> Result<C, Self> {
        match Arc::try_unwrap(self.episode) {
            Ok(mut episode) => {
                let conn = episode.conn.take();
                episode.pool.forget(episode.metadata.id);
                match conn {
                    Some(conn) => Ok(conn),
                    None => unreachable!("connection is only taken when the episode ends"),
                }
            }
            Err(episode) => Err(Self { episode }),
        }
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.episode.conn()
    }
}

impl<C: fmt::Debug> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("metadata", &self.episode.metadata)
            .field("conn", self.episode.conn())
            .finish()
    }
}

/// A cloneable alias of a pooled connection.
///
/// The connection goes back to the pool once every alias and the originating
/// [`PooledConnection`] are dropped, in any order.
pub struct SharedConnection<C> {
    episode: Arc<Episode<C>>,
}

impl<C> SharedConnection<C> {
    /// Get the connection metadata.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.episode.metadata
    }

    /// Number of live handles for this episode, this one included.
    #[must_use]
    pub fn alias_count(&self) -> usize {
        Arc::strong_count(&self.episode)
    }
}

impl<C> Clone for SharedConnection<C> {
    fn clone(&self) -> Self {
        Self {
            episode: Arc::clone(&self.episode),
        }
    }
}

impl<C> Deref for SharedConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.episode.conn()
    }
}

impl<C: fmt::Debug> fmt::Debug for SharedConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConnection")
            .field("metadata", &self.episode.metadata)
            .field("aliases", &self.alias_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use crate::{BoxError, Pool};

    fn pool(capacity: usize) -> Pool<String> {
        Pool::new(capacity, || Ok::<_, BoxError>(String::from("conn"))).unwrap()
    }

    #[test]
    fn test_return_on_drop() {
        let pool = pool(1);
        let lease = pool.acquire().unwrap();
        assert_eq!(pool.idle_count(), 0);
        drop(lease);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_alias_outlives_lease() {
        let pool = pool(1);
        let lease = pool.acquire().unwrap();
        let alias = lease.shared();
        let second = alias.clone();
        assert_eq!(lease.alias_count(), 3);

        drop(lease);
        assert_eq!(pool.idle_count(), 0);
        drop(alias);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(second.as_str(), "conn");
        drop(second);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.created_count(), 1);
    }

    #[test]
    fn test_into_shared_returns_once() {
        let pool = pool(2);
        let alias = pool.acquire().unwrap().into_shared();
        let clones: Vec<_> = (0..4).map(|_| alias.clone()).collect();
        drop(alias);
        drop(clones);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.metrics().returns, 1);
    }

    #[test]
    fn test_get_mut_requires_exclusivity() {
        let pool = pool(1);
        let mut lease = pool.acquire().unwrap();
        lease.get_mut().unwrap().push_str("-edited");

        let alias = lease.shared();
        assert!(lease.get_mut().is_none());
        drop(alias);
        assert_eq!(lease.get_mut().unwrap().as_str(), "conn-edited");
    }

    #[test]
    fn test_detach_frees_slot() {
        let pool = pool(1);
        let lease = pool.acquire().unwrap();
        let conn = lease.detach().unwrap();
        assert_eq!(conn, "conn");
        assert_eq!(pool.created_count(), 0);
        assert_eq!(pool.idle_count(), 0);
        assert!(pool.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_detach_refused_while_aliased() {
        let pool = pool(1);
        let lease = pool.acquire().unwrap();
        let alias = lease.shared();
        let lease = lease.detach().unwrap_err();
        drop(alias);
        drop(lease);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_metadata_counts_checkouts() {
        let pool = pool(1);
        let first_id = pool.acquire().unwrap().metadata().id;
        let lease = pool.acquire().unwrap();
        assert_eq!(lease.metadata().id, first_id);
        assert_eq!(lease.metadata().checkouts, 2);
        assert!(lease.metadata().last_checkout.is_some());
    }
}
