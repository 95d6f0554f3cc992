//! Connection pool implementation.
//!
//! All pool state (the idle set, the number of created connections and the
//! closed flag) lives behind one mutex. Connections are created by the factory
//! with that mutex released: a slot is reserved under the lock first, and the
//! reservation is rolled back if the factory fails or panics.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::PoolConfig;
use crate::error::{BoxError, PoolError};
use crate::lease::{ConnectionMetadata, PooledConnection};

type Factory<C> = Box<dyn Fn() -> Result<C, BoxError> + Send + Sync>;

/// A bounded pool of connections created on demand by a factory.
///
/// `Pool` is a cheap handle; clones share the same connections.
///
/// # Example
///
/// ```rust,ignore
/// use sqlpool_pool::{Pool, connection_factory};
///
/// let pool = Pool::builder()
///     .max_connections(4)
///     .factory(connection_factory(driver, "app.db", ConnectionConfig::new()))
///     .build()?;
///
/// let conn = pool.acquire()?;
/// conn.execute("SELECT 1;")?;
/// // Connection returns to the pool on drop
/// ```
pub struct Pool<C: Send + 'static> {
    inner: Arc<PoolInner<C>>,
}

pub(crate) struct PoolInner<C> {
    config: PoolConfig,
    factory: Factory<C>,
    state: Mutex<PoolState<C>>,
    /// Signalled whenever an idle connection or a free slot appears.
    available: Condvar,
    next_connection_id: AtomicU64,
    created_at: Instant,
    metrics: Mutex<PoolMetricsInner>,
}

struct PoolState<C> {
    /// Idle connections; the most recently returned one is reused first.
    idle: Vec<Idle<C>>,
    /// Connections in existence, idle or leased. Includes reserved slots
    /// whose factory call is still running.
    created: usize,
    closed: bool,
}

/// A connection sitting in the idle set.
pub(crate) struct Idle<C> {
    pub(crate) conn: C,
    pub(crate) metadata: ConnectionMetadata,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    connections_created: u64,
    connections_closed: u64,
    creation_failures: u64,
    checkouts_successful: u64,
    checkouts_failed: u64,
    returns: u64,
}

/// What a caller is entitled to after inspecting the pool state.
enum Checkout<C> {
    Idle(Idle<C>),
    Create,
}

/// A reserved creation slot. Dropping it without calling `commit` gives the
/// slot back and wakes one waiter.
struct SlotReservation<'a, C> {
    inner: &'a PoolInner<C>,
    committed: bool,
}

impl<C> SlotReservation<'_, C> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl<C> Drop for SlotReservation<'_, C> {
    fn drop(&mut self) {
        if !self.committed {
            self.inner.state.lock().created -= 1;
            self.inner.available.notify_one();
        }
    }
}

impl<C: Send + 'static> Pool<C> {
    /// Create a new pool builder.
    #[must_use]
    pub fn builder() -> PoolBuilder<C> {
        PoolBuilder::new()
    }

    /// Create a pool holding at most `capacity` connections made by `factory`.
    ///
    /// Fails if `capacity` is zero.
    pub fn new<F, E>(capacity: usize, factory: F) -> Result<Self, PoolError>
    where
        F: Fn() -> Result<C, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::builder()
            .max_connections(capacity)
            .factory(factory)
            .build()
    }

    /// Get a connection, blocking until one is idle or can be created.
    ///
    /// If the factory fails, the error is returned and the reserved slot is
    /// released so a later call can try again. With a configured
    /// `connection_timeout`, gives up with [`PoolError::Timeout`].
    pub fn acquire(&self) -> Result<PooledConnection<C>, PoolError> {
        self.acquire_within(self.inner.config.connection_timeout)
    }

    /// Like [`acquire`](Self::acquire), waiting at most `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<PooledConnection<C>, PoolError> {
        self.acquire_within(Some(timeout))
    }

    /// Get a connection without waiting.
    ///
    /// Returns `Ok(None)` if nothing is idle and the pool is full. May still
    /// call the factory when a slot is free.
    pub fn try_acquire(&self) -> Result<Option<PooledConnection<C>>, PoolError> {
        let checkout = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(self.inner.checkout_failed(PoolError::PoolClosed));
            }
            self.inner.reserve(&mut state)
        };
        checkout
            .map(|checkout| self.complete(checkout))
            .transpose()
    }

    fn acquire_within(&self, timeout: Option<Duration>) -> Result<PooledConnection<C>, PoolError> {
        tracing::trace!("acquiring connection from pool");
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        let checkout = {
            let mut state = self.inner.state.lock();
            let mut timed_out = false;
            loop {
                if state.closed {
                    return Err(self.inner.checkout_failed(PoolError::PoolClosed));
                }
                if let Some(checkout) = self.inner.reserve(&mut state) {
                    break checkout;
                }
                if timed_out {
                    let waited = timeout.unwrap_or_default();
                    tracing::debug!(?waited, "timed out waiting for a connection");
                    return Err(self.inner.checkout_failed(PoolError::Timeout(waited)));
                }
                match deadline {
                    None => self.inner.available.wait(&mut state),
                    Some(deadline) => {
                        // A wakeup that races the deadline is not lost: the
                        // state is checked once more before reporting a timeout.
                        timed_out = self
                            .inner
                            .available
                            .wait_until(&mut state, deadline)
                            .timed_out();
                    }
                }
            }
        };

        self.complete(checkout)
    }

    fn complete(&self, checkout: Checkout<C>) -> Result<PooledConnection<C>, PoolError> {
        let idle = match checkout {
            Checkout::Idle(idle) => idle,
            Checkout::Create => self.inner.create()?,
        };
        let mut metadata = idle.metadata;
        metadata.record_checkout();
        self.inner.metrics.lock().checkouts_successful += 1;
        tracing::trace!(connection_id = metadata.id, "connection checked out");
        Ok(PooledConnection::new(
            idle.conn,
            metadata,
            Arc::clone(&self.inner),
        ))
    }

    /// Maximum number of connections.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.config.max_connections
    }

    /// Number of idle connections right now.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// Number of connections created and not yet destroyed.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.inner.state.lock().created
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            available: state.idle.len(),
            in_use: state.created - state.idle.len(),
            total: state.created,
            max: self.inner.config.max_connections,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_closed: inner.connections_closed,
            creation_failures: inner.creation_failures,
            checkouts_successful: inner.checkouts_successful,
            checkouts_failed: inner.checkouts_failed,
            returns: inner.returns,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Close the pool.
    ///
    /// Idle connections are dropped and blocked callers fail with
    /// [`PoolError::PoolClosed`]. Leased connections are dropped when they
    /// come back.
    pub fn close(&self) {
        let idle = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.created -= idle.len();
            idle
        };
        self.inner.available.notify_all();
        self.inner.metrics.lock().connections_closed += idle.len() as u64;
        tracing::info!(dropped = idle.len(), "connection pool closed");
        drop(idle);
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl<C: Send + Sync + 'static> Pool<C> {
    /// Get a connection without blocking the async runtime.
    ///
    /// The wait runs on tokio's blocking thread pool. If the returned future is
    /// dropped early, a connection obtained in the background is returned to
    /// the pool rather than lost.
    pub async fn acquire_async(&self) -> Result<PooledConnection<C>, PoolError> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.acquire())
            .await
            .map_err(|e| PoolError::Join(e.to_string()))?
    }
}

impl<C> PoolInner<C> {
    /// Take an idle connection or reserve a creation slot, if either is
    /// possible right now.
    fn reserve(&self, state: &mut PoolState<C>) -> Option<Checkout<C>> {
        if let Some(idle) = state.idle.pop() {
            return Some(Checkout::Idle(idle));
        }
        if state.created < self.config.max_connections {
            state.created += 1;
            return Some(Checkout::Create);
        }
        None
    }

    /// Run the factory for a slot already counted in `created`.
    fn create(&self) -> Result<Idle<C>, PoolError> {
        let reservation = SlotReservation {
            inner: self,
            committed: false,
        };
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        match (self.factory)() {
            Ok(conn) => {
                reservation.commit();
                self.metrics.lock().connections_created += 1;
                tracing::debug!(connection_id = id, "connection created");
                Ok(Idle {
                    conn,
                    metadata: ConnectionMetadata::new(id),
                })
            }
            Err(e) => {
                drop(reservation);
                {
                    let mut metrics = self.metrics.lock();
                    metrics.creation_failures += 1;
                    metrics.checkouts_failed += 1;
                }
                tracing::debug!(error = %e, "connection creation failed");
                Err(PoolError::Factory(e))
            }
        }
    }

    fn checkout_failed(&self, error: PoolError) -> PoolError {
        self.metrics.lock().checkouts_failed += 1;
        error
    }

    /// Put a connection back into the idle set and wake one waiter.
    pub(crate) fn release(&self, idle: Idle<C>) {
        let id = idle.metadata.id;
        let mut state = self.state.lock();
        if state.closed {
            state.created -= 1;
            drop(state);
            self.metrics.lock().connections_closed += 1;
            tracing::trace!(connection_id = id, "pool closed, dropping returned connection");
            drop(idle);
            return;
        }
        state.idle.push(idle);
        drop(state);

        self.available.notify_one();
        self.metrics.lock().returns += 1;
        tracing::trace!(connection_id = id, "connection returned to pool");
    }

    /// Give up a slot whose connection was detached from the pool.
    pub(crate) fn forget(&self, id: u64) {
        self.state.lock().created -= 1;
        self.available.notify_one();
        tracing::debug!(connection_id = id, "connection detached from pool");
    }
}

impl<C: Send + 'static> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Send + 'static> fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Pool::builder()
///     .max_connections(8)
///     .connection_timeout(Duration::from_secs(5))
///     .factory(|| Connection::open(&driver, "app.db", ConnectionConfig::new()))
///     .build()?;
/// ```
pub struct PoolBuilder<C> {
    pool_config: PoolConfig,
    factory: Option<Factory<C>>,
}

impl<C: Send + 'static> PoolBuilder<C> {
    /// Create a new pool builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool_config: PoolConfig::default(),
            factory: None,
        }
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the number of connections created at build time.
    #[must_use]
    pub fn min_connections(mut self, count: usize) -> Self {
        self.pool_config.min_connections = count;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: usize) -> Self {
        self.pool_config.max_connections = count;
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.connection_timeout = Some(timeout);
        self
    }

    /// Set the function used to create connections.
    #[must_use]
    pub fn factory<F, E>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<C, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.factory = Some(Box::new(move || factory().map_err(Into::into)));
        self
    }

    /// Build the pool, creating `min_connections` connections up front.
    pub fn build(self) -> Result<Pool<C>, PoolError> {
        self.pool_config.validate()?;
        let factory = self
            .factory
            .ok_or_else(|| PoolError::Config("a connection factory is required".into()))?;

        let inner = Arc::new(PoolInner {
            config: self.pool_config,
            factory,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                created: 0,
                closed: false,
            }),
            available: Condvar::new(),
            next_connection_id: AtomicU64::new(1),
            created_at: Instant::now(),
            metrics: Mutex::new(PoolMetricsInner::default()),
        });

        for _ in 0..inner.config.min_connections {
            inner.state.lock().created += 1;
            let idle = inner.create()?;
            inner.state.lock().idle.push(idle);
        }

        tracing::info!(
            min = inner.config.min_connections,
            max = inner.config.max_connections,
            "connection pool created"
        );

        Ok(Pool { inner })
    }
}

impl<C: Send + 'static> Default for PoolBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: usize,
    /// Number of connections currently leased.
    pub in_use: usize,
    /// Total number of connections.
    pub total: usize,
    /// Maximum allowed connections.
    pub max: usize,
}

impl PoolStatus {
    /// Calculate pool utilization as a percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.in_use as f64 / self.max as f64) * 100.0
    }

    /// Check if the pool is at capacity with nothing idle.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total >= self.max && self.available == 0
    }
}

/// Metrics collected by the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Connections created since pool start.
    pub connections_created: u64,
    /// Connections dropped because the pool was closed.
    pub connections_closed: u64,
    /// Factory calls that failed.
    pub creation_failures: u64,
    /// Successful checkouts.
    pub checkouts_successful: u64,
    /// Failed checkouts (factory errors, timeouts, closed pool).
    pub checkouts_failed: u64,
    /// Connections returned to the idle set.
    pub returns: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_pool(capacity: usize) -> (Pool<usize>, Arc<AtomicUsize>) {
        let made = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&made);
        let pool = Pool::new(capacity, move || {
            Ok::<_, BoxError>(counter.fetch_add(1, Ordering::SeqCst))
        })
        .unwrap();
        (pool, made)
    }

    #[test]
    fn test_pool_status_utilization() {
        let status = PoolStatus {
            available: 5,
            in_use: 5,
            total: 10,
            max: 20,
        };
        assert!((status.utilization() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pool_status_at_capacity() {
        let status = PoolStatus {
            available: 0,
            in_use: 10,
            total: 10,
            max: 10,
        };
        assert!(status.is_at_capacity());

        let status2 = PoolStatus {
            available: 5,
            in_use: 5,
            total: 10,
            max: 20,
        };
        assert!(!status2.is_at_capacity());
    }

    #[test]
    fn test_pool_metrics_success_rate() {
        let metrics = PoolMetrics {
            connections_created: 10,
            connections_closed: 2,
            creation_failures: 1,
            checkouts_successful: 90,
            checkouts_failed: 10,
            returns: 85,
            uptime: Duration::from_secs(3600),
        };
        assert!((metrics.checkout_success_rate() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder_default() {
        let builder = PoolBuilder::<usize>::new();
        assert_eq!(builder.pool_config.min_connections, 0);
        assert_eq!(builder.pool_config.max_connections, 10);
    }

    #[test]
    fn test_builder_requires_factory() {
        let err = Pool::<usize>::builder().max_connections(2).build().unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = Pool::new(0, || Ok::<_, BoxError>(0usize)).unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn test_idle_connection_is_reused() {
        let (pool, made) = counting_pool(2);
        let first = *pool.acquire().unwrap();
        let second = *pool.acquire().unwrap();
        assert_eq!(first, second);
        assert_eq!(made.load(Ordering::SeqCst), 1);
        assert_eq!(pool.created_count(), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_lifo_reuse() {
        let (pool, _) = counting_pool(2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let b_value = *b;
        drop(a);
        drop(b);
        assert_eq!(*pool.acquire().unwrap(), b_value);
    }

    #[test]
    fn test_try_acquire_when_full() {
        let (pool, _) = counting_pool(1);
        let held = pool.try_acquire().unwrap().unwrap();
        assert!(pool.try_acquire().unwrap().is_none());
        drop(held);
        assert!(pool.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_acquire_timeout_expires() {
        let (pool, _) = counting_pool(1);
        let _held = pool.acquire().unwrap();
        let err = pool.acquire_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, PoolError::Timeout(_)));
        assert_eq!(pool.metrics().checkouts_failed, 1);
    }

    #[test]
    fn test_warm_up_creates_min_connections() {
        let made = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&made);
        let pool = Pool::builder()
            .min_connections(3)
            .max_connections(5)
            .factory(move || Ok::<_, BoxError>(counter.fetch_add(1, Ordering::SeqCst)))
            .build()
            .unwrap();
        assert_eq!(made.load(Ordering::SeqCst), 3);
        assert_eq!(pool.idle_count(), 3);
        assert_eq!(pool.created_count(), 3);
    }

    #[test]
    fn test_warm_up_failure_fails_build() {
        let err = Pool::builder()
            .min_connections(1)
            .max_connections(2)
            .factory(|| Err::<usize, BoxError>("unavailable".into()))
            .build()
            .unwrap_err();
        assert!(matches!(err, PoolError::Factory(_)));
    }

    #[test]
    fn test_close_drops_idle_and_rejects_acquire() {
        let (pool, _) = counting_pool(2);
        let held = pool.acquire().unwrap();
        drop(pool.acquire().unwrap());
        assert_eq!(pool.idle_count(), 1);

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.created_count(), 1);
        assert!(matches!(pool.acquire(), Err(PoolError::PoolClosed)));

        drop(held);
        assert_eq!(pool.created_count(), 0);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_close_wakes_waiters() {
        let (pool, _) = counting_pool(1);
        let _held = pool.acquire().unwrap();
        let waiter = {
            let pool = pool.clone();
            std::thread::spawn(move || pool.acquire().map(|_| ()))
        };
        std::thread::sleep(Duration::from_millis(20));
        pool.close();
        assert!(matches!(waiter.join().unwrap(), Err(PoolError::PoolClosed)));
    }

    #[test]
    fn test_panicking_factory_releases_slot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pool = Pool::new(1, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("factory blew up");
            }
            Ok::<_, BoxError>(7usize)
        })
        .unwrap();

        let attempt = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pool.acquire()));
        assert!(attempt.is_err());
        assert_eq!(pool.created_count(), 0);
        assert_eq!(*pool.acquire().unwrap(), 7);
    }

    #[test]
    fn test_metrics_track_checkouts_and_returns() {
        let (pool, _) = counting_pool(1);
        drop(pool.acquire().unwrap());
        drop(pool.acquire().unwrap());
        let metrics = pool.metrics();
        assert_eq!(metrics.connections_created, 1);
        assert_eq!(metrics.checkouts_successful, 2);
        assert_eq!(metrics.returns, 2);
    }
}
