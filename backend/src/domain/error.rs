//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound adapters map them to proxy
//! envelopes, HTTP responses or CLI diagnostics.

use serde::{Deserialize, Serialize};

use super::ports::EventPoolError;

/// Stable machine-readable error code describing the failure category.
///
/// Every code maps to a server-error status class; none of them describe a
/// client mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Required settings are missing or malformed.
    Configuration,
    /// A connection token could not be issued.
    Authentication,
    /// The database could not be reached or failed its liveness probe.
    Connection,
    /// A statement failed after a session was obtained.
    Query,
    /// A response could not be serialized.
    Serialization,
}

/// Domain error payload.
///
/// # Examples
/// ```
/// use click_recorder::domain::{Error, ErrorCode};
///
/// let err = Error::configuration("DSQL_CLUSTER_IDENTIFIER is not set");
/// assert_eq!(err.code(), ErrorCode::Configuration);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    code: ErrorCode,
    message: String,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Convenience constructor for [`ErrorCode::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Configuration, message)
    }

    /// Convenience constructor for [`ErrorCode::Authentication`].
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Authentication, message)
    }

    /// Convenience constructor for [`ErrorCode::Connection`].
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Connection, message)
    }

    /// Convenience constructor for [`ErrorCode::Query`].
    pub fn query(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Query, message)
    }

    /// Convenience constructor for [`ErrorCode::Serialization`].
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Serialization, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl From<EventPoolError> for Error {
    fn from(value: EventPoolError) -> Self {
        let code = match &value {
            EventPoolError::AuthenticationSetup { .. } => ErrorCode::Authentication,
            EventPoolError::Connect { .. } | EventPoolError::Closed => ErrorCode::Connection,
            EventPoolError::Query { .. } => ErrorCode::Query,
        };
        Self::new(code, value.to_string())
    }
}
