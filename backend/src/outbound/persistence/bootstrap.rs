//! Idempotent schema bootstrap for the events table.
//!
//! There is no migration history; the table is created on demand by the CLI
//! and by integration tests. Keep this DDL in step with `schema.rs`.

/// Creates the events table when it does not exist yet.
pub const CREATE_BUTTON_CLICKS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS button_clicks (
    id BIGINT PRIMARY KEY,
    timestamp TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
    action VARCHAR(100),
    user_agent TEXT,
    ip_address VARCHAR(45),
    created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
)";
