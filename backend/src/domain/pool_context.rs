//! Process-level owner of the memoized event pool.
//!
//! The pool is built lazily on first use, verified with one liveness probe,
//! and shared by every request until an operation reports it broken. At that
//! point the handle is closed and cleared so the next caller rebuilds it.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ports::{EventPool, EventPoolError, PoolFactory, PoolProfile, PoolTarget};

#[derive(Default)]
struct PoolState {
    pool: Option<Arc<dyn EventPool>>,
    generation: u64,
}

/// Memoizing owner of one [`EventPool`] for a fixed target and profile.
pub struct PoolContext {
    factory: Arc<dyn PoolFactory>,
    target: PoolTarget,
    profile: PoolProfile,
    state: Mutex<PoolState>,
}

impl PoolContext {
    pub fn new(factory: Arc<dyn PoolFactory>, target: PoolTarget, profile: PoolProfile) -> Self {
        Self {
            factory,
            target,
            profile,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Target every pool built by this context connects to.
    pub fn target(&self) -> &PoolTarget {
        &self.target
    }

    /// Return the memoized pool, building and probing a new one if needed.
    ///
    /// A freshly built pool that fails its probe is closed and not retained.
    /// Concurrent callers serialize on construction so at most one pool is
    /// built per generation.
    pub async fn acquire(&self) -> Result<Arc<dyn EventPool>, EventPoolError> {
        let mut state = self.state.lock().await;
        if let Some(pool) = state.pool.as_ref() {
            return Ok(Arc::clone(pool));
        }

        debug!(host = %self.target.hostname, "building database pool");
        let pool = self.factory.build(&self.target, &self.profile).await?;
        if let Err(err) = pool.ping().await {
            warn!(
                host = %self.target.hostname,
                error = %err,
                "new database pool failed its liveness probe"
            );
            pool.close().await;
            return Err(err);
        }

        state.generation += 1;
        state.pool = Some(Arc::clone(&pool));
        info!(
            host = %self.target.hostname,
            generation = state.generation,
            "database pool ready"
        );
        Ok(pool)
    }

    /// Close and clear the memoized pool if it is still `stale`.
    ///
    /// Returns `true` when the handle was cleared. A pool rebuilt by another
    /// caller in the meantime is left untouched.
    pub async fn invalidate(&self, stale: &Arc<dyn EventPool>) -> bool {
        let taken = {
            let mut state = self.state.lock().await;
            match state.pool.as_ref() {
                Some(current) if Arc::ptr_eq(current, stale) => state.pool.take(),
                _ => None,
            }
        };

        match taken {
            Some(pool) => {
                warn!(host = %self.target.hostname, "discarding database pool");
                pool.close().await;
                true
            }
            None => false,
        }
    }

    /// Number of pools successfully constructed so far.
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// Close the memoized pool, if any.
    pub async fn shutdown(&self) {
        let taken = self.state.lock().await.pool.take();
        if let Some(pool) = taken {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportFailureKind;
    use crate::domain::ports::{DatabaseRole, MockEventPool, MockPoolFactory, TlsMode};
    use rstest::{fixture, rstest};

    #[fixture]
    fn target() -> PoolTarget {
        PoolTarget {
            hostname: "abc.dsql.ap-northeast-1.on.aws".to_owned(),
            port: 5432,
            database: "postgres".to_owned(),
            region: "ap-northeast-1".to_owned(),
            role: DatabaseRole::Admin,
            tls: TlsMode::Require,
        }
    }

    fn healthy_pool() -> Arc<dyn EventPool> {
        let mut pool = MockEventPool::new();
        pool.expect_ping().returning(|| Ok(()));
        pool.expect_close().returning(|| ());
        Arc::new(pool)
    }

    #[rstest]
    #[tokio::test]
    async fn acquire_memoizes_the_pool(target: PoolTarget) {
        let mut factory = MockPoolFactory::new();
        factory
            .expect_build()
            .times(1)
            .returning(|_, _| Ok(healthy_pool()));
        let context = PoolContext::new(Arc::new(factory), target, PoolProfile::serverless());

        let first = context.acquire().await.expect("first acquire");
        let second = context.acquire().await.expect("second acquire");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(context.generation().await, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_probe_closes_and_discards_the_pool(target: PoolTarget) {
        let mut factory = MockPoolFactory::new();
        factory.expect_build().times(2).returning(|_, _| {
            let mut pool = MockEventPool::new();
            pool.expect_ping().times(1).returning(|| {
                Err(EventPoolError::connect(
                    TransportFailureKind::ConnectionRefused,
                    "connection refused",
                ))
            });
            pool.expect_close().times(1).returning(|| ());
            Ok(Arc::new(pool) as Arc<dyn EventPool>)
        });
        let context = PoolContext::new(Arc::new(factory), target, PoolProfile::serverless());

        assert!(context.acquire().await.is_err());
        assert!(context.acquire().await.is_err());
        assert_eq!(context.generation().await, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn invalidate_forces_a_rebuild(target: PoolTarget) {
        let mut factory = MockPoolFactory::new();
        factory
            .expect_build()
            .times(2)
            .returning(|_, _| Ok(healthy_pool()));
        let context = PoolContext::new(Arc::new(factory), target, PoolProfile::serverless());

        let first = context.acquire().await.expect("first acquire");
        assert!(context.invalidate(&first).await);
        let second = context.acquire().await.expect("rebuilt pool");

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(context.generation().await, 2);
    }

    #[rstest]
    #[tokio::test]
    async fn invalidating_a_superseded_pool_keeps_the_current_one(target: PoolTarget) {
        let mut factory = MockPoolFactory::new();
        factory
            .expect_build()
            .times(2)
            .returning(|_, _| Ok(healthy_pool()));
        let context = PoolContext::new(Arc::new(factory), target, PoolProfile::serverless());

        let stale = context.acquire().await.expect("first acquire");
        assert!(context.invalidate(&stale).await);
        let current = context.acquire().await.expect("rebuilt pool");

        assert!(!context.invalidate(&stale).await);
        let again = context.acquire().await.expect("memoized pool");
        assert!(Arc::ptr_eq(&current, &again));
    }

    #[rstest]
    #[tokio::test]
    async fn build_errors_are_returned_unchanged(target: PoolTarget) {
        let mut factory = MockPoolFactory::new();
        factory
            .expect_build()
            .times(1)
            .returning(|_, _| Err(EventPoolError::authentication_setup("no credentials")));
        let context = PoolContext::new(Arc::new(factory), target, PoolProfile::batch());

        let err = context.acquire().await.err().expect("build failure");
        assert_eq!(err, EventPoolError::authentication_setup("no credentials"));
    }
}
