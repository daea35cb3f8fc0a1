//! Port for issuing short-lived database connection tokens.
//!
//! A token is the password presented during the PostgreSQL handshake. It is
//! derived from the ambient cloud identity, expires quickly, and must be
//! generated afresh for every physical connection attempt.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use zeroize::Zeroize;

use super::define_port_error;

/// Lifetime requested for every issued token.
pub const TOKEN_TTL: Duration = Duration::from_secs(30);

/// Role the token authenticates as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatabaseRole {
    /// The built-in `admin` role, signed with the admin action.
    Admin,
    /// A custom database role, signed with the standard connect action.
    Standard { username: String },
}

impl DatabaseRole {
    /// Resolve a configured user name into a role.
    ///
    /// # Examples
    /// ```
    /// use click_recorder::domain::ports::DatabaseRole;
    ///
    /// assert_eq!(DatabaseRole::from_username("admin"), DatabaseRole::Admin);
    /// assert_eq!(
    ///     DatabaseRole::from_username("reporter").username(),
    ///     "reporter"
    /// );
    /// ```
    pub fn from_username(username: &str) -> Self {
        if username == "admin" {
            Self::Admin
        } else {
            Self::Standard {
                username: username.to_owned(),
            }
        }
    }

    /// PostgreSQL user name used in the connection configuration.
    pub fn username(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Standard { username } => username,
        }
    }

    /// Whether the admin signing path applies.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Everything needed to sign a token for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenRequest {
    pub hostname: String,
    pub region: String,
    pub role: DatabaseRole,
}

/// Opaque signed connection token.
///
/// The value is wiped from memory on drop and never appears in `Debug`
/// output.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in bytes; the only property of a token that may be logged.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

impl Drop for AuthToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

define_port_error! {
    /// Errors raised while issuing connection tokens.
    pub enum TokenIssuerError {
        /// Ambient cloud credentials or region could not be loaded.
        CredentialLoad { message: String } =>
            "authentication setup failed: could not load credentials: {message}",
        /// The signing call itself failed.
        Generation { message: String } =>
            "authentication setup failed: token generation failed: {message}",
        /// Issuance did not complete within its dedicated deadline.
        TimedOut { seconds: u64 } =>
            "authentication setup failed: token issuance exceeded {seconds}s",
    }
}

/// Port for signing database connection tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Produce a fresh token for `request`.
    ///
    /// Implementations must not cache tokens; each call yields a newly
    /// signed value valid for [`TOKEN_TTL`].
    async fn issue_token(&self, request: &TokenRequest) -> Result<AuthToken, TokenIssuerError>;
}

/// Issuer that returns a numbered placeholder token on every call.
///
/// Useful wherever a server accepts any password, such as a local
/// PostgreSQL running with `trust` authentication.
#[derive(Debug, Default)]
pub struct FixtureTokenIssuer {
    issued: std::sync::atomic::AtomicUsize,
}

impl FixtureTokenIssuer {
    /// Number of tokens issued so far.
    pub fn issued(&self) -> usize {
        self.issued.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for FixtureTokenIssuer {
    async fn issue_token(&self, request: &TokenRequest) -> Result<AuthToken, TokenIssuerError> {
        let serial = self
            .issued
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        Ok(AuthToken::new(format!(
            "fixture-token-{}-{serial}",
            request.role.username()
        )))
    }
}
