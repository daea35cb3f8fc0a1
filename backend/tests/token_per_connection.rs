//! Every physical connection is opened with its own freshly issued token.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use click_recorder::domain::ports::{FixtureTokenIssuer, TokenIssuer, TokenRequest};
use click_recorder::outbound::persistence::{
    ConnectError, Connector, CredentialInjector, DbPool, PoolConfig, TokenAuthManager,
    connection_config,
};
use tokio_postgres::Config;

mod support;

use support::fake_target;

/// Connector that remembers the password each dial was given.
#[derive(Clone, Default)]
struct PasswordRecorder {
    passwords: Arc<Mutex<Vec<String>>>,
}

impl PasswordRecorder {
    fn seen(&self) -> Vec<String> {
        self.passwords.lock().expect("passwords lock").clone()
    }
}

#[async_trait]
impl Connector for PasswordRecorder {
    type Connection = usize;

    async fn establish(&self, config: Config) -> Result<Self::Connection, ConnectError> {
        let password = config
            .get_password()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();
        let mut passwords = self.passwords.lock().expect("passwords lock");
        passwords.push(password);
        Ok(passwords.len())
    }

    async fn check(&self, _conn: &mut Self::Connection) -> Result<(), ConnectError> {
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

fn pool_with(
    issuer: Arc<FixtureTokenIssuer>,
    recorder: PasswordRecorder,
    max_size: u32,
) -> DbPool<PasswordRecorder> {
    let target = fake_target();
    let injector = CredentialInjector::new(
        issuer as Arc<dyn TokenIssuer>,
        TokenRequest {
            hostname: target.hostname.clone(),
            region: target.region.clone(),
            role: target.role.clone(),
        },
        Duration::from_secs(5),
    );
    let config = connection_config(&target).expect("connection config");
    let manager = TokenAuthManager::new(config, injector, recorder, Duration::from_secs(5));
    DbPool::new(
        PoolConfig::new()
            .with_max_size(max_size)
            .with_min_idle(Some(0))
            .with_connection_timeout(Duration::from_secs(5)),
        manager,
    )
}

#[tokio::test]
async fn concurrent_checkouts_each_get_a_distinct_token() {
    let issuer = Arc::new(FixtureTokenIssuer::default());
    let recorder = PasswordRecorder::default();
    let pool = pool_with(Arc::clone(&issuer), recorder.clone(), 4);

    let (a, b, c, d) = tokio::join!(pool.get(), pool.get(), pool.get(), pool.get());
    let held = [
        a.expect("first"),
        b.expect("second"),
        c.expect("third"),
        d.expect("fourth"),
    ];

    let mut seen = recorder.seen();
    assert_eq!(seen.len(), 4);
    assert_eq!(issuer.issued(), seen.len());
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 4, "tokens must not be reused");
    assert!(seen.iter().all(|p| p.starts_with("fixture-token-admin-")));
    drop(held);
}

#[tokio::test]
async fn reused_connections_do_not_reissue() {
    let issuer = Arc::new(FixtureTokenIssuer::default());
    let recorder = PasswordRecorder::default();
    let pool = pool_with(Arc::clone(&issuer), recorder.clone(), 1);

    for _ in 0..3 {
        let conn = pool.get().await.expect("checkout");
        drop(conn);
    }

    assert_eq!(recorder.seen().len(), 1);
    assert_eq!(issuer.issued(), 1);
}
