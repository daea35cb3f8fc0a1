//! HTTP server configuration object.

use std::net::SocketAddr;

use actix_web::web;
use click_recorder::inbound::gateway::ClickGateway;

/// Everything [`super::create_server`] needs.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) gateway: web::Data<ClickGateway>,
}

impl ServerConfig {
    #[must_use]
    pub fn new(bind_addr: SocketAddr, gateway: ClickGateway) -> Self {
        Self {
            bind_addr,
            gateway: web::Data::new(gateway),
        }
    }
}
