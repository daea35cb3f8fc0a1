//! Token-authenticated physical connections.
//!
//! Every physical connection the pool opens goes through
//! [`TokenAuthManager::connect`], which asks the [`CredentialInjector`] for a
//! freshly issued token, writes it into a copy of the secret-free connection
//! configuration and only then dials the server. Tokens are never cached or
//! shared between connections.

use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use diesel_async::pooled_connection::PoolableConnection;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use rustls::{ClientConfig, RootCertStore};
use tokio_postgres::error::SqlState;
use tokio_postgres::{Config, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::TransportFailureKind;
use crate::domain::ports::{
    EventPoolError, PoolTarget, TlsMode, TokenIssuer, TokenIssuerError, TokenRequest,
};

/// Failure to open or validate one physical connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// No token could be issued for the attempt.
    #[error(transparent)]
    Token(#[from] TokenIssuerError),
    /// The server could not be reached or rejected the session.
    #[error("database connection failed ({kind}): {message}")]
    Transport {
        kind: TransportFailureKind,
        message: String,
    },
    /// Dialling the server did not finish within the connect deadline.
    #[error("connection attempt timed out after {seconds}s")]
    TimedOut { seconds: u64 },
    /// The connection configuration could not be assembled.
    #[error("invalid connection configuration: {message}")]
    Config { message: String },
}

impl ConnectError {
    pub fn transport(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Classify a driver error raised while dialling or probing.
    pub fn from_driver(error: &tokio_postgres::Error) -> Self {
        let kind = match error.code() {
            Some(code)
                if *code == SqlState::INVALID_PASSWORD
                    || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION =>
            {
                TransportFailureKind::Authentication
            }
            _ => TransportFailureKind::classify_error(error),
        };
        Self::transport(kind, error.to_string())
    }
}

impl From<ConnectError> for EventPoolError {
    fn from(value: ConnectError) -> Self {
        match value {
            ConnectError::Token(err) => err.into(),
            ConnectError::Transport { kind, message } => Self::connect(kind, message),
            ConnectError::TimedOut { .. } => {
                Self::connect(TransportFailureKind::TimedOut, value.to_string())
            }
            ConnectError::Config { .. } => {
                Self::connect(TransportFailureKind::Other, value.to_string())
            }
        }
    }
}

/// Build the password-free connection configuration for `target`.
///
/// The URL form keeps the configuration printable; the password is only ever
/// set on per-attempt copies.
pub fn connection_config(target: &PoolTarget) -> Result<Config, ConnectError> {
    let invalid = |message: String| ConnectError::Config { message };

    let mut url = Url::parse(&format!("postgres://{}", target.hostname))
        .map_err(|err| invalid(format!("invalid host {}: {err}", target.hostname)))?;
    url.set_username(target.role.username())
        .map_err(|()| invalid("user name cannot be set on this URL".to_owned()))?;
    url.set_port(Some(target.port))
        .map_err(|()| invalid("port cannot be set on this URL".to_owned()))?;
    url.set_path(&target.database);
    let ssl_mode = match target.tls {
        TlsMode::Require => "require",
        TlsMode::Disable => "disable",
    };
    url.query_pairs_mut().append_pair("sslmode", ssl_mode);

    debug!(url = %url, "connection configuration");
    Config::from_str(url.as_str()).map_err(|err| invalid(err.to_string()))
}

/// Sets a freshly issued token as the password of each connection attempt.
pub struct CredentialInjector {
    issuer: Arc<dyn TokenIssuer>,
    request: TokenRequest,
    timeout: Duration,
}

impl CredentialInjector {
    pub fn new(issuer: Arc<dyn TokenIssuer>, request: TokenRequest, timeout: Duration) -> Self {
        Self {
            issuer,
            request,
            timeout,
        }
    }

    /// Issue a token within the issuance deadline and store it as the
    /// password of `config`.
    pub async fn inject(&self, config: &mut Config) -> Result<(), TokenIssuerError> {
        let token = tokio::time::timeout(self.timeout, self.issuer.issue_token(&self.request))
            .await
            .map_err(|_| TokenIssuerError::timed_out(self.timeout.as_secs()))??;
        info!(
            token_length = token.len(),
            role = self.request.role.username(),
            "auth token generated"
        );
        config.password(token.as_str());
        Ok(())
    }
}

/// Dials and validates physical connections.
///
/// Separating the dial from token injection keeps the manager testable
/// without a server.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Open one connection using the fully populated `config`.
    async fn establish(&self, config: Config) -> Result<Self::Connection, ConnectError>;

    /// Verify that an idle connection still answers.
    async fn check(&self, conn: &mut Self::Connection) -> Result<(), ConnectError>;

    /// Cheap, synchronous check for connections known to be dead.
    fn has_broken(&self, conn: &mut Self::Connection) -> bool;
}

/// Connector producing Diesel async PostgreSQL connections.
#[derive(Clone)]
pub struct PgConnector {
    tls: Option<MakeRustlsConnect>,
}

impl PgConnector {
    /// Create a connector for the given transport security mode.
    ///
    /// `Require` verifies server certificates against the web PKI roots.
    pub fn new(mode: TlsMode) -> Result<Self, ConnectError> {
        let tls = match mode {
            TlsMode::Disable => None,
            TlsMode::Require => Some(MakeRustlsConnect::new(rustls_config()?)),
        };
        Ok(Self { tls })
    }
}

fn rustls_config() -> Result<ClientConfig, ConnectError> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|err| ConnectError::Config {
        message: format!("TLS setup failed: {err}"),
    })?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(config)
}

fn spawn_driver<F>(connection: F)
where
    F: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            warn!(error = %err, "database connection closed with an error");
        }
    });
}

#[async_trait]
impl Connector for PgConnector {
    type Connection = AsyncPgConnection;

    async fn establish(&self, config: Config) -> Result<Self::Connection, ConnectError> {
        let client = match &self.tls {
            Some(tls) => {
                let (client, connection) = config
                    .connect(tls.clone())
                    .await
                    .map_err(|err| ConnectError::from_driver(&err))?;
                spawn_driver(connection);
                client
            }
            None => {
                let (client, connection) = config
                    .connect(NoTls)
                    .await
                    .map_err(|err| ConnectError::from_driver(&err))?;
                spawn_driver(connection);
                client
            }
        };

        AsyncPgConnection::try_from(client)
            .await
            .map_err(|err| ConnectError::transport(TransportFailureKind::Other, err.to_string()))
    }

    async fn check(&self, conn: &mut Self::Connection) -> Result<(), ConnectError> {
        diesel::sql_query("SELECT 1")
            .execute(conn)
            .await
            .map(|_| ())
            .map_err(|err| ConnectError::transport(TransportFailureKind::Other, err.to_string()))
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_broken()
    }
}

/// Connect attempts in flight and the most recent failure, kept so a
/// checkout timeout can report why no connection became available.
#[derive(Clone, Default)]
pub struct ConnectFailureLog {
    last: Arc<Mutex<Option<ConnectError>>>,
    dialing: Arc<AtomicUsize>,
}

impl ConnectFailureLog {
    fn record(&self, error: &ConnectError) {
        if let Ok(mut slot) = self.last.lock() {
            *slot = Some(error.clone());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.last.lock() {
            *slot = None;
        }
    }

    fn start_dial(&self) -> DialGuard {
        self.dialing.fetch_add(1, Ordering::SeqCst);
        DialGuard(Arc::clone(&self.dialing))
    }

    /// Take the last recorded failure, if any.
    pub fn take(&self) -> Option<ConnectError> {
        self.last.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Whether a connect attempt is still running.
    pub fn dialing(&self) -> bool {
        AtomicUsize::load(&self.dialing, Ordering::SeqCst) > 0
    }
}

/// Marks one connect attempt as in flight until dropped.
struct DialGuard(Arc<AtomicUsize>);

impl Drop for DialGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// bb8 connection manager that injects a fresh token before every connect.
pub struct TokenAuthManager<C: Connector> {
    config: Config,
    injector: CredentialInjector,
    connector: C,
    connect_timeout: Duration,
    failures: ConnectFailureLog,
}

impl<C: Connector> TokenAuthManager<C> {
    pub fn new(
        config: Config,
        injector: CredentialInjector,
        connector: C,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            config,
            injector,
            connector,
            connect_timeout,
            failures: ConnectFailureLog::default(),
        }
    }

    /// Shared handle onto the manager's failure log.
    pub fn failures(&self) -> ConnectFailureLog {
        self.failures.clone()
    }

    async fn connect_once(&self) -> Result<C::Connection, ConnectError> {
        let mut config = self.config.clone();
        self.injector.inject(&mut config).await?;

        tokio::time::timeout(self.connect_timeout, self.connector.establish(config))
            .await
            .map_err(|_| ConnectError::TimedOut {
                seconds: self.connect_timeout.as_secs(),
            })?
    }
}

#[async_trait]
impl<C: Connector> bb8::ManageConnection for TokenAuthManager<C> {
    type Connection = C::Connection;
    type Error = ConnectError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let _dial = self.failures.start_dial();
        match self.connect_once().await {
            Ok(conn) => {
                self.failures.clear();
                Ok(conn)
            }
            Err(err) => {
                warn!(error = %err, "database connection attempt failed");
                self.failures.record(&err);
                Err(err)
            }
        }
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        self.connector.check(conn).await
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        self.connector.has_broken(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{AuthToken, DatabaseRole, FixtureTokenIssuer, MockTokenIssuer};
    use bb8::ManageConnection;
    use rstest::{fixture, rstest};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records the password of every attempt instead of dialling.
    #[derive(Default)]
    struct RecordingConnector {
        attempts: AtomicUsize,
        passwords: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Connector for Arc<RecordingConnector> {
        type Connection = usize;

        async fn establish(&self, config: Config) -> Result<usize, ConnectError> {
            let password = config
                .get_password()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            self.passwords.lock().expect("passwords lock").push(password);
            Ok(self.attempts.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn check(&self, _conn: &mut usize) -> Result<(), ConnectError> {
            Ok(())
        }

        fn has_broken(&self, _conn: &mut usize) -> bool {
            false
        }
    }

    struct SlowIssuer;

    #[async_trait]
    impl TokenIssuer for SlowIssuer {
        async fn issue_token(&self, _request: &TokenRequest) -> Result<AuthToken, TokenIssuerError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(AuthToken::new("late"))
        }
    }

    /// Never completes a dial.
    struct HangingConnector;

    #[async_trait]
    impl Connector for HangingConnector {
        type Connection = ();

        async fn establish(&self, _config: Config) -> Result<(), ConnectError> {
            std::future::pending().await
        }

        async fn check(&self, _conn: &mut ()) -> Result<(), ConnectError> {
            Ok(())
        }

        fn has_broken(&self, _conn: &mut ()) -> bool {
            false
        }
    }

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

    fn token_request(target: &PoolTarget) -> TokenRequest {
        TokenRequest {
            hostname: target.hostname.clone(),
            region: target.region.clone(),
            role: target.role.clone(),
        }
    }

    #[rstest]
    fn config_carries_no_password(target: PoolTarget) {
        let config = connection_config(&target).expect("valid config");
        assert!(config.get_password().is_none());
        assert_eq!(config.get_user(), Some("admin"));
        assert_eq!(config.get_dbname(), Some("postgres"));
        assert_eq!(config.get_ports(), &[5432]);
    }

    #[rstest]
    #[tokio::test]
    async fn every_attempt_issues_its_own_token(target: PoolTarget) {
        let issuer = Arc::new(FixtureTokenIssuer::default());
        let connector = Arc::new(RecordingConnector::default());
        let manager = TokenAuthManager::new(
            connection_config(&target).expect("valid config"),
            CredentialInjector::new(issuer.clone(), token_request(&target), Duration::from_secs(5)),
            Arc::clone(&connector),
            Duration::from_secs(5),
        );

        for _ in 0..4 {
            manager.connect().await.expect("connect succeeds");
        }

        let passwords = connector.passwords.lock().expect("passwords lock").clone();
        let distinct: HashSet<_> = passwords.iter().collect();
        assert_eq!(AtomicUsize::load(&connector.attempts, Ordering::SeqCst), issuer.issued());
        assert_eq!(distinct.len(), passwords.len());
        assert_eq!(passwords.len(), 4);
    }

    #[rstest]
    #[tokio::test]
    async fn concurrent_pool_connections_each_get_a_token(target: PoolTarget) {
        let issuer = Arc::new(FixtureTokenIssuer::default());
        let connector = Arc::new(RecordingConnector::default());
        let manager = TokenAuthManager::new(
            connection_config(&target).expect("valid config"),
            CredentialInjector::new(issuer.clone(), token_request(&target), Duration::from_secs(5)),
            Arc::clone(&connector),
            Duration::from_secs(5),
        );
        let pool = bb8::Pool::builder()
            .max_size(3)
            .min_idle(None)
            .build_unchecked(manager);

        let (a, b, c) = tokio::join!(pool.get(), pool.get(), pool.get());
        let held = [a, b, c].map(|conn| conn.expect("checkout succeeds"));
        drop(held);

        let passwords = connector.passwords.lock().expect("passwords lock").clone();
        let distinct: HashSet<_> = passwords.iter().collect();
        assert_eq!(AtomicUsize::load(&connector.attempts, Ordering::SeqCst), issuer.issued());
        assert_eq!(distinct.len(), passwords.len());
    }

    #[rstest]
    #[tokio::test]
    async fn token_failure_fails_the_attempt(target: PoolTarget) {
        let mut issuer = MockTokenIssuer::new();
        issuer
            .expect_issue_token()
            .times(1)
            .return_once(|_| Err(TokenIssuerError::credential_load("no provider")));
        let connector = Arc::new(RecordingConnector::default());
        let manager = TokenAuthManager::new(
            connection_config(&target).expect("valid config"),
            CredentialInjector::new(Arc::new(issuer), token_request(&target), Duration::from_secs(5)),
            Arc::clone(&connector),
            Duration::from_secs(5),
        );

        let err = manager.connect().await.expect_err("token failure");

        assert!(matches!(err, ConnectError::Token(_)));
        assert_eq!(AtomicUsize::load(&connector.attempts, Ordering::SeqCst), 0);
        assert_eq!(manager.failures().take(), Some(err));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn slow_issuance_is_bounded(target: PoolTarget) {
        let injector = CredentialInjector::new(
            Arc::new(SlowIssuer),
            token_request(&target),
            Duration::from_secs(5),
        );
        let mut config = connection_config(&target).expect("valid config");

        let err = injector.inject(&mut config).await.expect_err("issuance timeout");

        assert_eq!(err, TokenIssuerError::timed_out(5_u64));
        assert!(config.get_password().is_none());
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn slow_dial_is_bounded(target: PoolTarget) {
        let manager = TokenAuthManager::new(
            connection_config(&target).expect("valid config"),
            CredentialInjector::new(
                Arc::new(FixtureTokenIssuer::default()),
                token_request(&target),
                Duration::from_secs(5),
            ),
            HangingConnector,
            Duration::from_secs(2),
        );

        let err = manager.connect().await.expect_err("dial timeout");

        assert_eq!(err, ConnectError::TimedOut { seconds: 2 });
        assert!(EventPoolError::from(err).is_environment_unreachable());
    }

    #[test]
    fn token_errors_surface_as_authentication_setup() {
        let err = EventPoolError::from(ConnectError::Token(TokenIssuerError::generation("x")));
        assert!(matches!(err, EventPoolError::AuthenticationSetup { .. }));
    }
}
