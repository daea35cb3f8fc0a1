//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! This module provides the concrete [`EventPool`](crate::domain::ports::EventPool)
//! and [`PoolFactory`](crate::domain::ports::PoolFactory) implementations,
//! backed by PostgreSQL via Diesel with async support through `diesel-async`
//! and `bb8` connection pooling.
//!
//! # Architecture
//!
//! - **Token per connection**: the bb8 manager issues a fresh IAM token for
//!   every physical connection attempt and never stores it.
//! - **Internal models**: Diesel row structs (`models.rs`) and schema
//!   definitions (`schema.rs`) are internal implementation details, never
//!   exposed to the domain layer.
//! - **Strongly typed errors**: driver errors are classified into
//!   [`TransportFailureKind`](crate::domain::TransportFailureKind) before they
//!   leave this module.
//!
//! # Example
//!
//! ```ignore
//! use click_recorder::outbound::persistence::DieselPoolFactory;
//!
//! let factory = DieselPoolFactory::new(issuer);
//! let pool = factory.build(&target, &PoolProfile::batch()).await?;
//! pool.ping().await?;
//! ```

mod bootstrap;
mod connection;
mod diesel_event_pool;
mod models;
mod pool;
mod pool_factory;
mod schema;

pub use bootstrap::CREATE_BUTTON_CLICKS_TABLE;
pub use connection::{
    ConnectError, ConnectFailureLog, Connector, CredentialInjector, PgConnector, TokenAuthManager,
    connection_config,
};
pub use diesel_event_pool::DieselEventPool;
pub use pool::{DbPool, PoolConfig, PoolError};
pub use pool_factory::{DEFAULT_TOKEN_TIMEOUT, DieselPoolFactory, pool_context};
