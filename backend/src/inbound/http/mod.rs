//! Actix-web adapter over the proxy gateway.

pub mod clicks;
pub mod health;

use actix_web::web;

/// Register the click routes under `scope`.
pub fn click_scope(scope: &str) -> actix_web::Scope {
    web::scope(scope)
        .service(clicks::record_click)
        .service(clicks::list_clicks)
        .service(clicks::preflight_clicks)
}
