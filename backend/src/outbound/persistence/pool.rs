//! Async-safe connection pool for token-authenticated PostgreSQL sessions.
//!
//! This module wraps `bb8` around [`TokenAuthManager`] so every physical
//! connection carries its own freshly issued token. The pool manages
//! connection lifecycle, validation and checkout with configurable limits.
//!
//! # Design
//!
//! - Construction never dials; the first checkout does
//! - Connections are validated with `SELECT 1` before each checkout
//! - The reaper retires sessions past their idle or lifetime bounds
//! - Failed dials are not retried; checkout errors carry their cause

use std::time::Duration;

use bb8::{Pool, PooledConnection, RunError};

use crate::domain::ports::PoolProfile;

use super::connection::{ConnectError, ConnectFailureLog, Connector, PgConnector, TokenAuthManager};

/// Errors that can occur during pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// A connection could not be established.
    #[error("failed to get connection from pool: {0}")]
    Connect(ConnectError),

    /// Every session stayed busy until the checkout deadline and no new
    /// connection was being dialled.
    #[error("failed to get connection from pool: all connections busy after {seconds}s")]
    Checkout { seconds: u64 },
}

/// Configuration for the database connection pool.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use click_recorder::outbound::persistence::PoolConfig;
///
/// let config = PoolConfig::new()
///     .with_max_size(20)
///     .with_min_idle(Some(5))
///     .with_connection_timeout(Duration::from_secs(30));
/// assert_eq!(config.max_size(), 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    max_size: u32,
    min_idle: Option<u32>,
    max_lifetime: Option<Duration>,
    idle_timeout: Option<Duration>,
    reaper_rate: Duration,
    connection_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolConfig {
    /// Create a new configuration with the batch profile's defaults.
    pub fn new() -> Self {
        Self::from_profile(&PoolProfile::batch())
    }

    /// Derive pool limits from a sizing profile.
    pub fn from_profile(profile: &PoolProfile) -> Self {
        Self {
            max_size: profile.max_size,
            min_idle: Some(profile.min_idle),
            max_lifetime: Some(profile.max_lifetime),
            idle_timeout: Some(profile.idle_timeout),
            reaper_rate: profile.health_check_period,
            connection_timeout: profile.connection_timeout,
        }
    }

    /// Set the maximum number of connections in the pool.
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the minimum number of idle connections to maintain.
    pub fn with_min_idle(mut self, min_idle: Option<u32>) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Set the connection checkout timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }
}

/// Async connection pool of token-authenticated sessions.
///
/// # Example
///
/// ```ignore
/// let pool = DbPool::new(config, manager);
/// let mut conn = pool.get().await?;
/// // Use conn for Diesel operations...
/// ```
pub struct DbPool<C: Connector = PgConnector> {
    inner: Pool<TokenAuthManager<C>>,
    failures: ConnectFailureLog,
    connection_timeout: Duration,
}

impl<C: Connector> Clone for DbPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            failures: self.failures.clone(),
            connection_timeout: self.connection_timeout,
        }
    }
}

impl<C: Connector> DbPool<C> {
    /// Create a pool. No connection is opened until the first checkout, apart
    /// from the idle minimum bb8 replenishes in the background.
    pub fn new(config: PoolConfig, manager: TokenAuthManager<C>) -> Self {
        let failures = manager.failures();
        let inner = Pool::builder()
            .max_size(config.max_size)
            .min_idle(config.min_idle)
            .max_lifetime(config.max_lifetime)
            .idle_timeout(config.idle_timeout)
            .reaper_rate(config.reaper_rate)
            .connection_timeout(config.connection_timeout)
            .test_on_check_out(true)
            .retry_connection(false)
            .build_unchecked(manager);

        Self {
            inner,
            failures,
            connection_timeout: config.connection_timeout,
        }
    }

    /// Get a connection from the pool.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Connect` with the dial failure when a connection
    /// attempt failed or was still dialling at the deadline, or
    /// `PoolError::Checkout` when the pool was simply at capacity.
    pub async fn get(&self) -> Result<PooledConnection<'_, TokenAuthManager<C>>, PoolError> {
        self.inner.get().await.map_err(|err| match err {
            RunError::User(cause) => PoolError::Connect(cause),
            RunError::TimedOut => {
                let seconds = self.connection_timeout.as_secs();
                match self.failures.take() {
                    Some(cause) => PoolError::Connect(cause),
                    None if self.failures.dialing() => {
                        PoolError::Connect(ConnectError::TimedOut { seconds })
                    }
                    None => PoolError::Checkout { seconds },
                }
            }
        })
    }
}
