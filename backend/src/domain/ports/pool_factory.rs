//! Port for constructing event pools.
//!
//! The factory captures everything a pool needs that is not a secret: the
//! endpoint, the database, the role to authenticate as and the sizing profile.
//! Credentials are issued per connection by the adapter it returns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{DatabaseRole, EventPool, EventPoolError};

/// Transport security for database sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Verify the server against the bundled web PKI roots.
    #[default]
    Require,
    /// Plain TCP. Only meaningful for local servers.
    Disable,
}

/// Where a pool connects and as whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolTarget {
    pub hostname: String,
    pub port: u16,
    pub database: String,
    pub region: String,
    pub role: DatabaseRole,
    pub tls: TlsMode,
}

/// Sizing and recycling bounds for a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolProfile {
    pub max_size: u32,
    pub min_idle: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
    pub health_check_period: Duration,
    pub connection_timeout: Duration,
}

impl PoolProfile {
    /// Profile for long-running CLI and batch processes.
    ///
    /// # Examples
    /// ```
    /// use click_recorder::domain::ports::PoolProfile;
    ///
    /// assert_eq!(PoolProfile::batch().max_size, 10);
    /// ```
    pub fn batch() -> Self {
        Self {
            max_size: 10,
            min_idle: 2,
            max_lifetime: Duration::from_secs(60 * 60),
            idle_timeout: Duration::from_secs(30 * 60),
            health_check_period: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(10),
        }
    }

    /// Profile for short-lived request handlers.
    pub fn serverless() -> Self {
        Self {
            max_size: 5,
            min_idle: 1,
            max_lifetime: Duration::from_secs(5 * 60),
            idle_timeout: Duration::from_secs(60),
            health_check_period: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }

    /// Override the physical connect deadline.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Port for building a pool for one target.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PoolFactory: Send + Sync {
    /// Construct a pool. No liveness probe is performed here.
    async fn build(
        &self,
        target: &PoolTarget,
        profile: &PoolProfile,
    ) -> Result<Arc<dyn EventPool>, EventPoolError>;
}
