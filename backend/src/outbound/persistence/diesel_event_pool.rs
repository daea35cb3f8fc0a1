//! PostgreSQL-backed `EventPool` implementation using Diesel.
//!
//! Each method checks out one token-authenticated session, runs a single
//! statement and returns the session to the pool.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_async::RunQueryDsl;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::ports::{EventPool, EventPoolError};
use crate::domain::{ClickEventRow, EventOrder, NewClickEvent, TransportFailureKind};

use super::bootstrap::CREATE_BUTTON_CLICKS_TABLE;
use super::connection::ConnectError;
use super::models::{ButtonClickRow, NewButtonClickRow};
use super::pool::{DbPool, PoolError};
use super::schema::button_clicks;

/// Diesel-backed implementation of the `EventPool` port.
///
/// Closing drops the underlying bb8 pool, which disconnects idle sessions
/// and stops its reaper.
pub struct DieselEventPool {
    pool: RwLock<Option<DbPool>>,
}

impl DieselEventPool {
    /// Wrap an open connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool: RwLock::new(Some(pool)),
        }
    }

    async fn pool(&self) -> Result<DbPool, EventPoolError> {
        self.pool
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(EventPoolError::Closed)
    }
}

/// Map pool errors to event pool errors.
fn map_pool_error(error: PoolError) -> EventPoolError {
    match error {
        PoolError::Connect(cause) => cause.into(),
        PoolError::Checkout { .. } => {
            EventPoolError::connect(TransportFailureKind::PoolExhausted, error.to_string())
        }
    }
}

/// Map Diesel errors to event pool errors.
fn map_diesel_error(error: diesel::result::Error) -> EventPoolError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            EventPoolError::connect(TransportFailureKind::Other, info.message())
        }
        DieselError::DatabaseError(_, info) => EventPoolError::query(info.message()),
        other => EventPoolError::query(other.to_string()),
    }
}

/// Map a failed liveness probe. The statement never reached the table, so
/// every failure is a connection failure.
fn map_probe_error(error: diesel::result::Error) -> EventPoolError {
    ConnectError::transport(TransportFailureKind::Other, error.to_string()).into()
}

#[async_trait]
impl EventPool for DieselEventPool {
    async fn ping(&self) -> Result<(), EventPoolError> {
        let pool = self.pool().await?;
        let mut conn = pool.get().await.map_err(map_pool_error)?;
        diesel::sql_query("SELECT 1")
            .execute(&mut *conn)
            .await
            .map_err(map_probe_error)?;
        Ok(())
    }

    async fn server_version(&self) -> Result<String, EventPoolError> {
        let pool = self.pool().await?;
        let mut conn = pool.get().await.map_err(map_pool_error)?;
        diesel::select(diesel::dsl::sql::<Text>("version()"))
            .get_result::<String>(&mut *conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn ensure_schema(&self) -> Result<(), EventPoolError> {
        let pool = self.pool().await?;
        let mut conn = pool.get().await.map_err(map_pool_error)?;
        diesel::sql_query(CREATE_BUTTON_CLICKS_TABLE)
            .execute(&mut *conn)
            .await
            .map_err(map_diesel_error)?;
        info!("button_clicks table ensured");
        Ok(())
    }

    async fn count_events(&self) -> Result<i64, EventPoolError> {
        let pool = self.pool().await?;
        let mut conn = pool.get().await.map_err(map_pool_error)?;
        button_clicks::table
            .count()
            .get_result::<i64>(&mut *conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn insert_events(&self, events: &[NewClickEvent]) -> Result<(), EventPoolError> {
        if events.is_empty() {
            return Ok(());
        }
        let pool = self.pool().await?;
        let mut conn = pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<NewButtonClickRow<'_>> = events.iter().map(NewButtonClickRow::from).collect();
        let inserted = diesel::insert_into(button_clicks::table)
            .values(&rows)
            .execute(&mut *conn)
            .await
            .map_err(map_diesel_error)?;
        debug!(inserted, "click rows inserted");
        Ok(())
    }

    async fn list_events(&self, order: EventOrder) -> Result<Vec<ClickEventRow>, EventPoolError> {
        let pool = self.pool().await?;
        let mut conn = pool.get().await.map_err(map_pool_error)?;
        let query = button_clicks::table.select(ButtonClickRow::as_select());
        let rows = match order {
            EventOrder::ById => {
                query
                    .order(button_clicks::id.asc())
                    .load::<ButtonClickRow>(&mut *conn)
                    .await
            }
            EventOrder::NewestFirst => {
                query
                    .order(button_clicks::created_at.desc())
                    .load::<ButtonClickRow>(&mut *conn)
                    .await
            }
        }
        .map_err(map_diesel_error)?;

        Ok(rows.into_iter().map(ClickEventRow::from).collect())
    }

    async fn close(&self) {
        if self.pool.write().await.take().is_some() {
            debug!("database pool closed");
        }
    }
}
