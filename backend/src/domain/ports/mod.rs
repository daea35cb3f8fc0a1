//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod event_pool;
mod pool_factory;
mod token_issuer;

#[cfg(test)]
pub use event_pool::MockEventPool;
pub use event_pool::{EventPool, EventPoolError};
#[cfg(test)]
pub use pool_factory::MockPoolFactory;
pub use pool_factory::{PoolFactory, PoolProfile, PoolTarget, TlsMode};
#[cfg(test)]
pub use token_issuer::MockTokenIssuer;
pub use token_issuer::{
    AuthToken, DatabaseRole, FixtureTokenIssuer, TOKEN_TTL, TokenIssuer, TokenIssuerError,
    TokenRequest,
};
