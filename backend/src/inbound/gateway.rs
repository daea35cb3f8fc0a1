//! Proxy-envelope adapter for the record and list operations.
//!
//! Requests arrive in the API Gateway proxy shape and leave as a
//! `{statusCode, headers, body}` envelope whose body is a JSON string. Every
//! call yields a well-formed envelope; failures are encoded in the status code
//! and body rather than returned as errors.
//!
//! ```text
//! OPTIONS *              -> 200, CORS headers, empty body
//! POST    (record)       -> 200 | 500, RecordBody
//! GET     (list)         -> 200 | 500, ListBody | ListErrorBody
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{FixedOffset, SecondsFormat};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::domain::{
    AUTH_METHOD, ClickService, DISPLAY_TIMESTAMP_FORMAT, Error, ErrorCode, EventColumns,
    RecordReceipt,
};

const DEFAULT_USER_AGENT: &str = "Unknown";
const DEFAULT_SOURCE_IP: &str = "0.0.0.0";
const LIST_SUCCESS_MESSAGE: &str = "Successfully retrieved button clicks";

/// Inbound request in the API Gateway proxy shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub http_method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub request_context: RequestContext,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub identity: RequestIdentity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdentity {
    #[serde(default)]
    pub source_ip: String,
}

impl ProxyRequest {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn is_preflight(&self) -> bool {
        self.http_method.eq_ignore_ascii_case("OPTIONS")
    }

    fn user_agent(&self) -> &str {
        self.header("User-Agent")
            .filter(|ua| !ua.is_empty())
            .unwrap_or(DEFAULT_USER_AGENT)
    }

    fn source_ip(&self) -> &str {
        let ip = self.request_context.identity.source_ip.as_str();
        if ip.is_empty() { DEFAULT_SOURCE_IP } else { ip }
    }
}

/// Outbound response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ProxyResponse {
    fn new(status_code: u16, body: String) -> Self {
        Self {
            status_code,
            headers: cors_headers(),
            body,
        }
    }

    fn json<T: Serialize>(status_code: u16, payload: &T, now: &str) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Self::new(status_code, body),
            Err(err) => {
                warn!(error = %err, "response serialization failed");
                let body = json!({
                    "error": list_error_label(ErrorCode::Serialization),
                    "message": format!("Failed to serialize response: {err}"),
                    "timestamp": now,
                });
                Self::new(500, body.to_string())
            }
        }
    }
}

fn cors_headers() -> BTreeMap<String, String> {
    [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Headers", "Content-Type"),
        ("Access-Control-Allow-Methods", "OPTIONS,POST,GET"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_owned(), value.to_owned()))
    .collect()
}

/// Body of a record response.
#[derive(Debug, Clone, Serialize)]
pub struct RecordBody {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    pub user_agent: String,
    pub source_ip: String,
    pub database_result: DatabaseResult,
}

/// Outcome of the database step of a record call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DatabaseResult {
    Success(RecordReceipt),
    Error {
        message: String,
        auth_method: String,
    },
}

/// Body of a successful list response.
#[derive(Debug, Clone, Serialize)]
pub struct ListBody {
    pub button_clicks: Vec<EventColumns>,
    pub count: usize,
    pub message: String,
    pub timestamp: String,
}

/// Body of a failed list response.
#[derive(Debug, Clone, Serialize)]
pub struct ListErrorBody {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

fn list_error_label(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Configuration => "Configuration Error",
        ErrorCode::Authentication | ErrorCode::Connection => "Database Connection Error",
        ErrorCode::Query => "Query Execution Error",
        ErrorCode::Serialization => "Response Serialization Error",
    }
}

/// Adapter between proxy envelopes and [`ClickService`].
///
/// The service is held as a `Result` so a configuration problem detected at
/// start-up is reported on every request instead of preventing start-up.
pub struct ClickGateway {
    service: Result<Arc<ClickService>, Error>,
    cluster_label: String,
    display_offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl ClickGateway {
    pub fn new(
        service: Result<Arc<ClickService>, Error>,
        cluster_label: impl Into<String>,
        display_offset: FixedOffset,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service,
            cluster_label: cluster_label.into(),
            display_offset,
            clock,
        }
    }

    /// CORS preflight. Never touches the database.
    pub fn preflight(&self) -> ProxyResponse {
        ProxyResponse::new(200, String::new())
    }

    /// Route by HTTP method: `OPTIONS` preflight, `POST` record, `GET` list.
    pub async fn handle(&self, request: &ProxyRequest) -> ProxyResponse {
        match request.http_method.to_ascii_uppercase().as_str() {
            "OPTIONS" => self.preflight(),
            "POST" => self.handle_record(request).await,
            "GET" => self.handle_list(request).await,
            other => {
                let body = ListErrorBody {
                    error: "Method Not Allowed".to_owned(),
                    message: format!("unsupported method {other}"),
                    timestamp: self.rfc3339_now(),
                };
                ProxyResponse::json(405, &body, &body.timestamp)
            }
        }
    }

    /// Record one click from `request`.
    pub async fn handle_record(&self, request: &ProxyRequest) -> ProxyResponse {
        if request.is_preflight() {
            return self.preflight();
        }

        let user_agent = request.user_agent().to_owned();
        let source_ip = request.source_ip().to_owned();
        let timestamp = self
            .clock
            .utc()
            .with_timezone(&self.display_offset)
            .format(DISPLAY_TIMESTAMP_FORMAT)
            .to_string();
        info!(
            request_id = %request.request_context.request_id,
            user_agent = %user_agent,
            source_ip = %source_ip,
            "record request"
        );

        let outcome = match &self.service {
            Ok(service) => service.record_event(&user_agent, &source_ip).await,
            Err(err) => Err(err.clone()),
        };
        let (status, database_result) = match outcome {
            Ok(receipt) => (200, DatabaseResult::Success(receipt)),
            Err(err) => {
                warn!(code = ?err.code(), error = %err, "record failed");
                (
                    500,
                    DatabaseResult::Error {
                        message: err.message().to_owned(),
                        auth_method: AUTH_METHOD.to_owned(),
                    },
                )
            }
        };

        let body = RecordBody {
            success: status == 200,
            message: format!("button click recorded - cluster: {}", self.cluster_label),
            timestamp,
            user_agent,
            source_ip,
            database_result,
        };
        ProxyResponse::json(status, &body, &self.rfc3339_now())
    }

    /// List every stored click.
    pub async fn handle_list(&self, request: &ProxyRequest) -> ProxyResponse {
        if request.is_preflight() {
            return self.preflight();
        }
        info!(
            request_id = %request.request_context.request_id,
            path = %request.path,
            "list request"
        );

        let outcome = match &self.service {
            Ok(service) => service.list_events().await,
            Err(err) => Err(err.clone()),
        };
        let timestamp = self.rfc3339_now();
        match outcome {
            Ok(rows) => {
                let body = ListBody {
                    count: rows.len(),
                    button_clicks: rows,
                    message: LIST_SUCCESS_MESSAGE.to_owned(),
                    timestamp: timestamp.clone(),
                };
                ProxyResponse::json(200, &body, &timestamp)
            }
            Err(err) => {
                warn!(code = ?err.code(), error = %err, "list failed");
                let body = ListErrorBody {
                    error: list_error_label(err.code()).to_owned(),
                    message: err.message().to_owned(),
                    timestamp: timestamp.clone(),
                };
                ProxyResponse::json(500, &body, &timestamp)
            }
        }
    }

    fn rfc3339_now(&self) -> String {
        self.clock
            .utc()
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
