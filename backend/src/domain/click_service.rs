//! Recording and listing click events.
//!
//! [`ClickService`] drives both request paths through a shared
//! [`PoolContext`]. Recording degrades to [`MockResponder`] when the database
//! endpoint is unreachable from the current network, so the surrounding
//! application can be exercised on a workstation without cloud access.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::error::{Error, ErrorCode};
use super::event::{DISPLAY_TIMESTAMP_FORMAT, EventColumns, EventId, EventOrder, NewClickEvent};
use super::pool_context::PoolContext;
use super::ports::{EventPool, EventPoolError};

/// Authentication scheme reported in every receipt.
pub const AUTH_METHOD: &str = "official_dsql_auth";

/// Version banner reported when no database was contacted.
pub const MOCK_DATABASE_VERSION: &str = "PostgreSQL 15.0 (Mock for local development)";

const RECORD_SUCCESS_MESSAGE: &str = "Data inserted successfully with official DSQL auth";
const MOCK_MESSAGE: &str = "Mock data insertion for local development";
const MOCK_NOTE: &str = "This is a mock response for local development. \
    Real DSQL connection will be used in AWS environment.";

/// Outcome of a successful record call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordReceipt {
    pub message: String,
    pub auth_method: String,
    pub database_version: String,
    pub inserted_id: i64,
    pub inserted_at: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub local_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Produces a deterministic success receipt without touching the database.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockResponder;

impl MockResponder {
    pub fn respond(&self, user_agent: &str, source_ip: &str, now: DateTime<Utc>) -> RecordReceipt {
        info!(
            user_agent,
            source_ip, "database unreachable; answering with a local development receipt"
        );
        RecordReceipt {
            message: MOCK_MESSAGE.to_owned(),
            auth_method: AUTH_METHOD.to_owned(),
            database_version: MOCK_DATABASE_VERSION.to_owned(),
            inserted_id: EventId::from_instant(now).get(),
            inserted_at: now.format(DISPLAY_TIMESTAMP_FORMAT).to_string(),
            local_mode: true,
            note: Some(MOCK_NOTE.to_owned()),
        }
    }
}

/// Domain service for the record and list operations.
pub struct ClickService {
    pools: Arc<PoolContext>,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    mock: MockResponder,
}

impl ClickService {
    pub fn new(pools: Arc<PoolContext>, clock: Arc<dyn Clock>, request_timeout: Duration) -> Self {
        Self {
            pools,
            clock,
            request_timeout,
            mock: MockResponder,
        }
    }

    /// Pool context shared by both operations.
    pub fn pools(&self) -> &Arc<PoolContext> {
        &self.pools
    }

    /// Record one click.
    ///
    /// Connection and probe failures that mean the endpoint is unreachable
    /// produce a mock receipt. Any other connection failure discards the pool
    /// and is returned. Version and insert failures are returned as query
    /// errors and leave the pool in place.
    pub async fn record_event(
        &self,
        user_agent: &str,
        source_ip: &str,
    ) -> Result<RecordReceipt, Error> {
        self.with_deadline(self.record_inner(user_agent, source_ip))
            .await
    }

    async fn record_inner(&self, user_agent: &str, source_ip: &str) -> Result<RecordReceipt, Error> {
        let pool = match self.pinged_pool().await {
            Ok(pool) => pool,
            Err((_, err)) if err.is_environment_unreachable() => {
                return Ok(self.mock.respond(user_agent, source_ip, self.clock.utc()));
            }
            Err((context, err)) => {
                error!(error = %err, context, "database connection failed");
                return Err(contextual(err, context));
            }
        };

        let version = pool.server_version().await.map_err(|err| {
            error!(error = %err, "version query failed");
            Error::query(format!("Failed to execute test query: {err}"))
        })?;
        info!(version = %version, "connected to database");

        let now = self.clock.utc();
        let id = EventId::from_instant(now);
        let event = NewClickEvent::record(id, user_agent, source_ip);
        pool.insert_events(std::slice::from_ref(&event))
            .await
            .map_err(|err| {
                error!(error = %err, id = id.get(), "click insert failed");
                Error::query(format!("Data insertion failed: {err}"))
            })?;

        info!(id = id.get(), "click recorded");
        Ok(RecordReceipt {
            message: RECORD_SUCCESS_MESSAGE.to_owned(),
            auth_method: AUTH_METHOD.to_owned(),
            database_version: version,
            inserted_id: id.get(),
            inserted_at: now.format(DISPLAY_TIMESTAMP_FORMAT).to_string(),
            local_mode: false,
            note: None,
        })
    }

    /// List every stored click ordered by identifier.
    ///
    /// Any query failure discards the pool so the next call reconnects. A
    /// query still running at the request deadline counts as a failure.
    pub async fn list_events(&self) -> Result<Vec<EventColumns>, Error> {
        let deadline = Instant::now() + self.request_timeout;
        let mut reacquired = false;
        loop {
            let pool = tokio::time::timeout_at(deadline, self.pools.acquire())
                .await
                .map_err(|_| self.deadline_exceeded())?
                .map_err(|err| {
                    error!(error = %err, "failed to connect to database");
                    contextual(err, "Failed to connect to database")
                })?;

            let err = match tokio::time::timeout_at(deadline, pool.list_events(EventOrder::ById))
                .await
            {
                Ok(Ok(rows)) => {
                    info!(count = rows.len(), "clicks listed");
                    return Ok(rows.into_iter().map(|row| row.into_columns()).collect());
                }
                Ok(Err(EventPoolError::Closed)) if !reacquired => {
                    debug!("pool closed by a concurrent caller; reacquiring");
                    reacquired = true;
                    self.pools.invalidate(&pool).await;
                    continue;
                }
                Ok(Err(err)) => err.to_string(),
                Err(_) => self.deadline_exceeded().message().to_owned(),
            };

            warn!(error = %err, "listing failed; discarding pool");
            self.pools.invalidate(&pool).await;
            return Err(Error::query(format!("Failed to execute query: {err}")));
        }
    }

    /// Acquire the memoized pool and check it answers.
    ///
    /// A pool closed by a concurrent invalidation between the two steps is
    /// replaced once. The error carries the step that failed.
    async fn pinged_pool(&self) -> Result<Arc<dyn EventPool>, (&'static str, EventPoolError)> {
        let mut reacquired = false;
        loop {
            let pool = self
                .pools
                .acquire()
                .await
                .map_err(|err| ("Failed to create connection pool", err))?;
            match pool.ping().await {
                Ok(()) => return Ok(pool),
                Err(EventPoolError::Closed) if !reacquired => {
                    debug!("pool closed by a concurrent caller; reacquiring");
                    reacquired = true;
                    self.pools.invalidate(&pool).await;
                }
                Err(err) => {
                    self.pools.invalidate(&pool).await;
                    return Err(("Failed to ping database", err));
                }
            }
        }
    }

    fn deadline_exceeded(&self) -> Error {
        warn!(
            timeout_secs = self.request_timeout.as_secs(),
            "request deadline exceeded"
        );
        Error::connection(format!(
            "request deadline of {}s exceeded",
            self.request_timeout.as_secs()
        ))
    }

    async fn with_deadline<T>(
        &self,
        operation: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        tokio::time::timeout(self.request_timeout, operation)
            .await
            .unwrap_or_else(|_| Err(self.deadline_exceeded()))
    }
}

fn contextual(err: EventPoolError, context: &str) -> Error {
    let code = Error::from(err.clone()).code();
    let code = match code {
        ErrorCode::Query => ErrorCode::Connection,
        other => other,
    };
    Error::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
#[path = "click_service_tests.rs"]
mod tests;
