//! Builds Diesel event pools for a target.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::DsqlSettings;
use crate::domain::ports::{
    EventPool, EventPoolError, PoolFactory, PoolProfile, PoolTarget, TokenIssuer, TokenRequest,
};
use crate::domain::{Error, PoolContext};

use super::connection::{CredentialInjector, PgConnector, TokenAuthManager, connection_config};
use super::diesel_event_pool::DieselEventPool;
use super::pool::{DbPool, PoolConfig};

/// Default deadline for issuing one connection token.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Factory wiring the token issuer, the bb8 manager and the Diesel adapter.
pub struct DieselPoolFactory {
    issuer: Arc<dyn TokenIssuer>,
    token_timeout: Duration,
}

impl DieselPoolFactory {
    pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            issuer,
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }

    /// Bound each token issuance by `timeout`.
    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = timeout;
        self
    }
}

#[async_trait]
impl PoolFactory for DieselPoolFactory {
    async fn build(
        &self,
        target: &PoolTarget,
        profile: &PoolProfile,
    ) -> Result<Arc<dyn EventPool>, EventPoolError> {
        let config = connection_config(target)?;
        let connector = PgConnector::new(target.tls)?;
        let injector = CredentialInjector::new(
            Arc::clone(&self.issuer),
            TokenRequest {
                hostname: target.hostname.clone(),
                region: target.region.clone(),
                role: target.role.clone(),
            },
            self.token_timeout,
        );
        let manager =
            TokenAuthManager::new(config, injector, connector, profile.connection_timeout);

        debug!(
            host = %target.hostname,
            database = %target.database,
            max_size = profile.max_size,
            "creating connection pool"
        );
        let pool = DbPool::new(PoolConfig::from_profile(profile), manager);
        Ok(Arc::new(DieselEventPool::new(pool)))
    }
}

/// Assemble a [`PoolContext`] for the cluster described by `settings`.
///
/// Timeouts from `settings` override those in `profile`. Nothing is dialled
/// until the context is first acquired.
pub fn pool_context(
    settings: &DsqlSettings,
    issuer: Arc<dyn TokenIssuer>,
    profile: PoolProfile,
) -> Result<PoolContext, Error> {
    let target = settings.pool_target()?;
    let factory = DieselPoolFactory::new(issuer).with_token_timeout(settings.token_timeout());
    Ok(PoolContext::new(
        Arc::new(factory),
        target,
        profile.with_connection_timeout(settings.connect_timeout()),
    ))
}
