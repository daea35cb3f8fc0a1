//! Inbound adapters translating external requests into domain service calls.
//!
//! [`gateway`] owns the proxy envelope; [`http`] serves it over Actix.

pub mod gateway;
pub mod http;
