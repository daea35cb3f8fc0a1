//! Port for a pooled handle onto the click events store.
//!
//! An [`EventPool`] owns a set of authenticated sessions to one database.
//! Every method borrows a session for a single statement and returns it.

use async_trait::async_trait;

use crate::domain::TransportFailureKind;
use crate::domain::event::{ClickEventRow, EventOrder, NewClickEvent};

use super::TokenIssuerError;
use super::define_port_error;

define_port_error! {
    /// Errors raised by event pool adapters.
    pub enum EventPoolError {
        /// A session could not be established or failed its liveness probe.
        Connect { kind: TransportFailureKind, message: String } =>
            "database connection failed ({kind}): {message}",
        /// A connection token could not be issued.
        AuthenticationSetup { message: String } =>
            "{message}",
        /// A statement failed after a session was obtained.
        Query { message: String } =>
            "database query failed: {message}",
        /// The pool has been closed.
        Closed =>
            "connection pool is closed",
    }
}

impl EventPoolError {
    /// Whether the failure means the endpoint cannot be reached from here.
    ///
    /// Only connection failures are classified. Query failures are never
    /// environmental.
    pub fn is_environment_unreachable(&self) -> bool {
        match self {
            Self::Connect { kind, .. } => kind.is_environment_unreachable(),
            Self::AuthenticationSetup { .. } | Self::Query { .. } | Self::Closed => false,
        }
    }
}

impl From<TokenIssuerError> for EventPoolError {
    fn from(value: TokenIssuerError) -> Self {
        Self::authentication_setup(value.to_string())
    }
}

/// Port for statements against the click events table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPool: Send + Sync {
    /// Borrow a session and run a trivial statement.
    async fn ping(&self) -> Result<(), EventPoolError>;

    /// Return the server's version banner.
    async fn server_version(&self) -> Result<String, EventPoolError>;

    /// Create the events table if it is missing.
    async fn ensure_schema(&self) -> Result<(), EventPoolError>;

    /// Count stored events.
    async fn count_events(&self) -> Result<i64, EventPoolError>;

    /// Insert every event in a single statement; either all rows land or none.
    async fn insert_events(&self, events: &[NewClickEvent]) -> Result<(), EventPoolError>;

    /// Read every stored event in the requested order.
    async fn list_events(&self, order: EventOrder) -> Result<Vec<ClickEventRow>, EventPoolError>;

    /// Release every session. Later calls fail with [`EventPoolError::Closed`].
    async fn close(&self);
}
