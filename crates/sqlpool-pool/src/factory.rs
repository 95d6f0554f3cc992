//! Factories that open [`Connection`]s for a pool.

use sqlpool_client::{Connection, ConnectionConfig, Driver};

use crate::pool::Pool;

/// A pool of client connections opened through driver `D`.
pub type ConnectionPool<D> = Pool<Connection<<D as Driver>::Connection>>;

/// Build a pool factory that opens `target` through `driver` with `config`.
///
/// ```rust,ignore
/// let pool: ConnectionPool<MyDriver> = Pool::builder()
///     .max_connections(4)
///     .factory(connection_factory(driver, "app.db", ConnectionConfig::new()))
///     .build()?;
/// ```
pub fn connection_factory<D: Driver>(
    driver: D,
    target: impl Into<String>,
    config: ConnectionConfig,
) -> impl Fn() -> Result<Connection<D::Connection>, sqlpool_client::Error> + Send + Sync + 'static
{
    let target = target.into();
    move || Connection::open(&driver, &target, config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use sqlpool_client::OpenMode;
    use sqlpool_testing::MockDriver;

    #[test]
    fn test_factory_opens_with_config() {
        let driver = MockDriver::new();
        let factory = connection_factory(driver.clone(), "app.db", ConnectionConfig::new());
        let conn = factory().unwrap();
        assert!(conn.is_open());
        assert_eq!(driver.stats().opened, 1);
    }

    #[test]
    fn test_factory_propagates_open_failure() {
        let driver = MockDriver::new();
        let config = ConnectionConfig::new().open_mode(OpenMode::Existing);
        let pool: ConnectionPool<MockDriver> =
            Pool::new(1, connection_factory(driver.clone(), "missing.db", config)).unwrap();

        assert!(pool.acquire().is_err());
        assert_eq!(pool.created_count(), 0);
        driver.create_database("missing.db");
        assert!(pool.acquire().is_ok());
    }
}
