//! Connection and statement cache configuration.

use sqlpool_driver::OpenMode;

/// Settings for the per-connection statement cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StatementCacheConfig {
    /// Maximum number of cached statements. Zero disables caching.
    pub capacity: usize,

    /// Whether caching is enabled at all.
    pub enabled: bool,
}

impl Default for StatementCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            enabled: true,
        }
    }
}

impl StatementCacheConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration that never caches.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the maximum number of cached statements.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Enable or disable caching.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether statements will actually be retained.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.capacity > 0
    }
}

/// Settings applied when opening a [`Connection`](crate::Connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionConfig {
    /// How the driver should open the database.
    pub open_mode: OpenMode,

    /// Statement cache settings.
    pub statement_cache: StatementCacheConfig,
}

impl ConnectionConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open mode.
    #[must_use]
    pub fn open_mode(mut self, mode: OpenMode) -> Self {
        self.open_mode = mode;
        self
    }

    /// Set the statement cache configuration.
    #[must_use]
    pub fn statement_cache(mut self, config: StatementCacheConfig) -> Self {
        self.statement_cache = config;
        self
    }
}
