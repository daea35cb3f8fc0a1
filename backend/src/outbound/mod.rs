//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **auth**: IAM connection tokens from the AWS SDK
//! - **persistence**: token-authenticated PostgreSQL pools using Diesel
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod auth;
pub mod persistence;
