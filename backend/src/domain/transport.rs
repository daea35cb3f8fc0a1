//! Classification of connection failures.
//!
//! Adapters tag every connect or ping failure with a [`TransportFailureKind`].
//! The domain matches on the tag to decide whether the managed database is
//! simply not reachable from the current network (local development, no VPC
//! route) or whether the failure is genuine and must be reported.

use std::fmt;
use std::io;

/// Category of a failed attempt to reach the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFailureKind {
    /// The endpoint hostname could not be resolved.
    HostResolution,
    /// The endpoint actively refused the TCP connection.
    ConnectionRefused,
    /// Connecting or waiting for the server timed out.
    TimedOut,
    /// The server rejected the credentials presented during the handshake.
    Authentication,
    /// Every pooled session stayed busy past the checkout deadline while no
    /// new connection was being dialled.
    PoolExhausted,
    /// Any other transport or protocol failure.
    Other,
}

/// Message fragments emitted by resolvers and socket layers when the endpoint
/// cannot be reached at all. Used only when no structured error is available.
const HOST_RESOLUTION_MARKERS: &[&str] = &[
    "no such host",
    "hostname resolving error",
    "failed to lookup address",
    "name or service not known",
];
const REFUSED_MARKERS: &[&str] = &["connection refused"];
const TIMEOUT_MARKERS: &[&str] = &["i/o timeout", "timed out"];

impl TransportFailureKind {
    /// Whether this failure means the managed endpoint is categorically
    /// unreachable from the current network context.
    ///
    /// # Examples
    /// ```
    /// use click_recorder::domain::TransportFailureKind;
    ///
    /// assert!(TransportFailureKind::HostResolution.is_environment_unreachable());
    /// assert!(!TransportFailureKind::Authentication.is_environment_unreachable());
    /// ```
    pub fn is_environment_unreachable(self) -> bool {
        match self {
            Self::HostResolution | Self::ConnectionRefused | Self::TimedOut => true,
            Self::Authentication | Self::PoolExhausted | Self::Other => false,
        }
    }

    /// Map a structured I/O error kind, if it identifies a known category.
    pub fn from_io_kind(kind: io::ErrorKind) -> Option<Self> {
        match kind {
            io::ErrorKind::ConnectionRefused => Some(Self::ConnectionRefused),
            io::ErrorKind::TimedOut => Some(Self::TimedOut),
            io::ErrorKind::NotFound | io::ErrorKind::AddrNotAvailable => {
                Some(Self::HostResolution)
            }
            _ => None,
        }
    }

    /// Classify free-form error text.
    ///
    /// Resolver failures surface as plain `io::Error`s with an uncategorised
    /// kind, so their text is the only signal left once the structured
    /// checks in [`Self::classify_error`] come up empty.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        if contains_any(HOST_RESOLUTION_MARKERS) {
            Self::HostResolution
        } else if contains_any(REFUSED_MARKERS) {
            Self::ConnectionRefused
        } else if contains_any(TIMEOUT_MARKERS) {
            Self::TimedOut
        } else {
            Self::Other
        }
    }

    /// Classify an error by walking its source chain for an `io::Error`,
    /// falling back to the rendered message.
    pub fn classify_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
        while let Some(err) = current {
            if let Some(kind) = err
                .downcast_ref::<io::Error>()
                .and_then(|io_err| Self::from_io_kind(io_err.kind()))
            {
                return kind;
            }
            current = err.source();
        }

        let mut rendered = error.to_string();
        let mut source = error.source();
        while let Some(err) = source {
            rendered.push_str(": ");
            rendered.push_str(&err.to_string());
            source = err.source();
        }
        Self::from_message(&rendered)
    }
}

impl fmt::Display for TransportFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::HostResolution => "host_resolution",
            Self::ConnectionRefused => "connection_refused",
            Self::TimedOut => "timed_out",
            Self::Authentication => "authentication",
            Self::PoolExhausted => "pool_exhausted",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}
