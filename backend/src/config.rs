//! Runtime settings loaded via OrthoConfig.
//!
//! Settings are read once at start-up. Missing values are not fatal there;
//! they surface as configuration errors when a request first needs them.

use std::env;
use std::ffi::OsString;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::FixedOffset;
use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::Error;
use crate::domain::ports::{DatabaseRole, PoolTarget, TlsMode};

const DEFAULT_DATABASE: &str = "postgres";
const DEFAULT_USER: &str = "admin";
const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Connection settings for the Aurora DSQL cluster.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "DSQL")]
pub struct DsqlSettings {
    /// Cluster identifier; the endpoint is derived from it and the region.
    pub cluster_identifier: Option<String>,
    /// Database to connect to.
    pub database_name: Option<String>,
    /// AWS region of the cluster.
    pub region: Option<String>,
    /// Explicit endpoint hostname overriding the derived one.
    pub endpoint: Option<String>,
    #[ortho_config(default = 5432)]
    pub port: u16,
    /// Database role; `admin` selects the admin token.
    pub user: Option<String>,
    /// `require` (default) or `disable`.
    pub tls: Option<String>,
    /// Bound on issuing one connection token.
    #[ortho_config(default = 5)]
    pub token_timeout_secs: u64,
    /// Bound on dialling one physical connection.
    #[ortho_config(default = 10)]
    pub connect_timeout_secs: u64,
    /// Bound on one record or list operation end to end.
    #[ortho_config(default = 25)]
    pub request_timeout_secs: u64,
    /// Offset applied to human-readable timestamps in responses. The default
    /// is Japan Standard Time.
    #[ortho_config(default = 540)]
    pub display_utc_offset_minutes: i32,
}

impl DsqlSettings {
    /// Load from the environment, ignoring command-line arguments.
    pub fn from_env(program: &str) -> Result<Self, Error> {
        Self::load_from_iter([OsString::from(program)])
            .map_err(|err| Error::configuration(format!("failed to load DSQL settings: {err}")))
    }

    pub fn database_name(&self) -> &str {
        self.database_name.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or(DEFAULT_USER)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolve the region, falling back to the standard AWS variables.
    pub fn region(&self) -> Result<String, Error> {
        self.region
            .clone()
            .filter(|region| !region.trim().is_empty())
            .or_else(|| env::var("AWS_REGION").ok())
            .or_else(|| env::var("AWS_DEFAULT_REGION").ok())
            .filter(|region| !region.trim().is_empty())
            .ok_or_else(|| {
                Error::configuration("no region configured; set DSQL_REGION or AWS_REGION")
            })
    }

    /// Label identifying the cluster in responses.
    pub fn cluster_label(&self) -> Result<String, Error> {
        self.cluster_identifier
            .clone()
            .or_else(|| self.endpoint.clone())
            .filter(|label| !label.trim().is_empty())
            .ok_or_else(|| Error::configuration("DSQL_CLUSTER_IDENTIFIER is not set"))
    }

    /// Endpoint hostname: the explicit override, or
    /// `<cluster>.dsql.<region>.on.aws`.
    pub fn hostname(&self) -> Result<String, Error> {
        if let Some(endpoint) = self.endpoint.as_ref().filter(|e| !e.trim().is_empty()) {
            return Ok(endpoint.clone());
        }
        let cluster = self
            .cluster_identifier
            .as_ref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::configuration("DSQL_CLUSTER_IDENTIFIER is not set"))?;
        Ok(format!("{cluster}.dsql.{}.on.aws", self.region()?))
    }

    pub fn tls_mode(&self) -> Result<TlsMode, Error> {
        match self.tls.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("require") => Ok(TlsMode::Require),
            Some("disable") => Ok(TlsMode::Disable),
            Some(other) => Err(Error::configuration(format!(
                "DSQL_TLS must be `require` or `disable`, got `{other}`"
            ))),
        }
    }

    pub fn display_offset(&self) -> Result<FixedOffset, Error> {
        let minutes = self.display_utc_offset_minutes;
        FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
            Error::configuration(format!(
                "DSQL_DISPLAY_UTC_OFFSET_MINUTES is out of range: {minutes}"
            ))
        })
    }

    /// Everything a pool needs to reach the cluster.
    pub fn pool_target(&self) -> Result<PoolTarget, Error> {
        Ok(PoolTarget {
            hostname: self.hostname()?,
            port: self.port(),
            database: self.database_name().to_owned(),
            region: self.region()?,
            role: DatabaseRole::from_username(self.user()),
            tls: self.tls_mode()?,
        })
    }
}

/// Settings for the HTTP server binary.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CLICK_SERVER")]
pub struct ServerSettings {
    /// Port to listen on when no full bind address is given.
    #[ortho_config(default = 8080)]
    pub port: u16,
    /// Socket address to listen on; overrides `port`.
    pub bind_addr: Option<String>,
}

impl ServerSettings {
    /// Load from the environment, ignoring command-line arguments.
    pub fn from_env(program: &str) -> Result<Self, Error> {
        Self::load_from_iter([OsString::from(program)])
            .map_err(|err| Error::configuration(format!("failed to load server settings: {err}")))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, Error> {
        let raw = self
            .bind_addr
            .clone()
            .unwrap_or_else(|| format!("{DEFAULT_BIND_HOST}:{}", self.port));
        raw.parse().map_err(|err| {
            Error::configuration(format!("CLICK_SERVER_BIND_ADDR `{raw}` is invalid: {err}"))
        })
    }
}
