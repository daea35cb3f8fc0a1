//! Shared logic for the command-line clients.
//!
//! `dsql-client` bootstraps the events table, seeds it with three sample rows
//! when it is empty and prints every row newest-first. `dsql-version` prints
//! the server version banner. Both connect with the batch pool profile.

use std::fmt::Write as _;

use thiserror::Error;
use tracing::info;

use crate::domain::ports::{EventPool, EventPoolError};
use crate::domain::{EVENT_COLUMNS, EventColumns, EventId, EventOrder, NewClickEvent, PoolContext};

/// Rows written by `dsql-client` into an empty table: `(id, user_agent, ip)`.
pub const SAMPLE_CLICKS: [(i64, &str, &str); 3] = [
    (1, "Mozilla/5.0 (Test Browser)", "192.168.1.1"),
    (2, "Mozilla/5.0 (Another Browser)", "192.168.1.2"),
    (3, "Go DSQL Client", "127.0.0.1"),
];

const CELL_WIDTH: usize = 20;
const CELL_SEPARATOR: &str = " | ";

/// A fatal step in a CLI run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliError {
    #[error("DSQL connection failed: {0}")]
    Connect(EventPoolError),
    #[error("table creation failed: {0}")]
    CreateTable(EventPoolError),
    #[error("failed to count existing data: {0}")]
    Count(EventPoolError),
    #[error("failed to insert sample data: {0}")]
    Seed(EventPoolError),
    #[error("failed to execute query: {0}")]
    Query(EventPoolError),
}

/// What the seeding step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The table already held this many rows; nothing was written.
    AlreadyPopulated(i64),
    /// The sample rows were inserted.
    Inserted(usize),
}

/// The sample rows as insertable events.
pub fn sample_events() -> Vec<NewClickEvent> {
    SAMPLE_CLICKS
        .iter()
        .map(|(id, user_agent, ip)| NewClickEvent::record(EventId::new(*id), *user_agent, *ip))
        .collect()
}

/// Insert [`SAMPLE_CLICKS`] in one statement if the table is empty.
pub async fn seed_if_empty(pool: &dyn EventPool) -> Result<SeedOutcome, CliError> {
    let existing = pool.count_events().await.map_err(CliError::Count)?;
    if existing > 0 {
        info!(existing, "events table already populated; skipping sample data");
        return Ok(SeedOutcome::AlreadyPopulated(existing));
    }

    let events = sample_events();
    pool.insert_events(&events).await.map_err(CliError::Seed)?;
    info!(inserted = events.len(), "sample data inserted");
    Ok(SeedOutcome::Inserted(events.len()))
}

/// Result of a full `dsql-client` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReport {
    pub seed: SeedOutcome,
    pub rows: Vec<EventColumns>,
}

/// Connect, create the table, seed it if empty and read it back newest-first.
///
/// The pool is closed before returning, on success and on failure.
pub async fn run_client(pools: &PoolContext) -> Result<ClientReport, CliError> {
    let outcome = client_steps(pools).await;
    pools.shutdown().await;
    outcome
}

async fn client_steps(pools: &PoolContext) -> Result<ClientReport, CliError> {
    let pool = pools.acquire().await.map_err(CliError::Connect)?;
    pool.ensure_schema().await.map_err(CliError::CreateTable)?;
    let seed = seed_if_empty(pool.as_ref()).await?;
    let rows = pool
        .list_events(EventOrder::NewestFirst)
        .await
        .map_err(CliError::Query)?
        .into_iter()
        .map(|row| row.into_columns())
        .collect();
    Ok(ClientReport { seed, rows })
}

/// Connect and return the server version banner.
pub async fn fetch_version(pools: &PoolContext) -> Result<String, CliError> {
    let outcome = match pools.acquire().await {
        Ok(pool) => pool.server_version().await.map_err(CliError::Query),
        Err(err) => Err(CliError::Connect(err)),
    };
    pools.shutdown().await;
    outcome
}

/// Render rows as a fixed-width text table.
///
/// Every cell is left-aligned and padded to 20 characters. The header is
/// always printed, even for an empty table.
pub fn render_table(rows: &[EventColumns]) -> String {
    let mut out = String::new();
    push_line(&mut out, EVENT_COLUMNS.iter().map(|name| (*name).to_owned()));
    out.push_str(&"-".repeat(EVENT_COLUMNS.len() * (CELL_WIDTH + 3)));
    out.push('\n');
    for row in rows {
        push_line(&mut out, row.values().map(ToString::to_string));
    }
    out
}

fn push_line(out: &mut String, cells: impl Iterator<Item = String>) {
    for (index, cell) in cells.enumerate() {
        if index > 0 {
            out.push_str(CELL_SEPARATOR);
        }
        // Writing to a String cannot fail.
        let _ = write!(out, "{cell:<CELL_WIDTH$}");
    }
    out.push('\n');
}

/// `"PostgreSQL 16.4 on ..."` becomes `Some("PostgreSQL 16.4")`.
///
/// Returns `None` unless the banner names PostgreSQL and has at least two
/// words.
pub fn version_summary(version: &str) -> Option<String> {
    if !version.contains("PostgreSQL") {
        return None;
    }
    let mut words = version.split_whitespace();
    match (words.next(), words.next()) {
        (Some(first), Some(second)) => Some(format!("{first} {second}")),
        _ => None,
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
