//! Actix routes for the click endpoints.
//!
//! ```text
//! POST    /api/v1/clicks   record a click
//! GET     /api/v1/clicks   list every click
//! OPTIONS /api/v1/clicks   CORS preflight
//! ```
//!
//! Each handler converts the Actix request into a [`ProxyRequest`] and hands
//! it to the shared [`ClickGateway`], so the HTTP server and a proxy
//! integration produce identical bodies.

use std::collections::HashMap;

use actix_web::http::StatusCode;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{HttpRequest, HttpResponse, get, post, route, web};
use tracing::warn;

use crate::inbound::gateway::{
    ClickGateway, ProxyRequest, ProxyResponse, RequestContext, RequestIdentity,
};
use crate::middleware::RequestId;

/// Record one click.
#[post("/clicks")]
pub async fn record_click(gateway: web::Data<ClickGateway>, request: HttpRequest) -> HttpResponse {
    let proxy = to_proxy_request(&request);
    into_http_response(gateway.handle_record(&proxy).await)
}

/// List all clicks ordered by identifier.
#[get("/clicks")]
pub async fn list_clicks(gateway: web::Data<ClickGateway>, request: HttpRequest) -> HttpResponse {
    let proxy = to_proxy_request(&request);
    into_http_response(gateway.handle_list(&proxy).await)
}

/// CORS preflight.
#[route("/clicks", method = "OPTIONS")]
pub async fn preflight_clicks(gateway: web::Data<ClickGateway>) -> HttpResponse {
    into_http_response(gateway.preflight())
}

fn to_proxy_request(request: &HttpRequest) -> ProxyRequest {
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_owned(), value.to_owned()))
        })
        .collect();
    let request_id = RequestId::current().unwrap_or_else(RequestId::generate);
    let source_ip = request
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default();

    ProxyRequest {
        http_method: request.method().as_str().to_owned(),
        path: request.path().to_owned(),
        headers,
        request_context: RequestContext {
            request_id: request_id.to_string(),
            identity: RequestIdentity { source_ip },
        },
    }
}

fn into_http_response(response: ProxyResponse) -> HttpResponse {
    let status = StatusCode::from_u16(response.status_code).unwrap_or_else(|_| {
        warn!(status = response.status_code, "invalid status code from gateway");
        StatusCode::INTERNAL_SERVER_ERROR
    });
    let mut builder = HttpResponse::build(status);
    for (name, value) in &response.headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                builder.insert_header((name, value));
            }
            _ => warn!(header = %name, "dropping unencodable response header"),
        }
    }
    builder.body(response.body)
}
