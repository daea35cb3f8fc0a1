//! Server construction and middleware wiring.

mod config;
mod state_builders;

pub use config::ServerConfig;
pub use state_builders::build_gateway;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use click_recorder::inbound::gateway::ClickGateway;
use click_recorder::inbound::http::click_scope;
use click_recorder::inbound::http::health::{HealthState, live, ready};
use click_recorder::middleware::RequestIdLayer;

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    gateway: web::Data<ClickGateway>,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        gateway,
    } = deps;

    App::new()
        .app_data(health_state)
        .app_data(gateway)
        .wrap(RequestIdLayer)
        .service(click_scope("/api/v1"))
        .service(ready)
        .service(live)
}

/// Construct an Actix HTTP server using the provided health state and configuration.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let server_health_state = health_state.clone();
    let ServerConfig { bind_addr, gateway } = config;

    let server = HttpServer::new(move || {
        build_app(AppDependencies {
            health_state: server_health_state.clone(),
            gateway: gateway.clone(),
        })
    })
    .bind(bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}
