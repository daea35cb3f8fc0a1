//! HTTP entry-point: serves the click record and list endpoints.

mod server;

use std::sync::Arc;

use actix_web::web;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use click_recorder::config::{DsqlSettings, ServerSettings};
use click_recorder::inbound::http::health::HealthState;
use click_recorder::outbound::auth::AwsDsqlTokenIssuer;

use server::{ServerConfig, build_gateway, create_server};

const PROGRAM: &str = "click-server";

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let bind_addr = ServerSettings::from_env(PROGRAM)
        .and_then(|settings| settings.bind_addr())
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    let gateway = build_gateway(
        DsqlSettings::from_env(PROGRAM),
        Arc::new(AwsDsqlTokenIssuer::new()),
    );

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state.clone(), ServerConfig::new(bind_addr, gateway))?;
    info!(%bind_addr, "click server listening");

    let result = server.await;
    health_state.mark_unhealthy();
    result
}
