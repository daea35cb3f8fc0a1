//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::{ClickEventRow, NewClickEvent};

use super::schema::button_clicks;

/// Row struct for reading from the button_clicks table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = button_clicks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ButtonClickRow {
    pub id: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub action: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ButtonClickRow> for ClickEventRow {
    fn from(row: ButtonClickRow) -> Self {
        Self {
            id: row.id,
            timestamp: row.timestamp,
            action: row.action,
            user_agent: row.user_agent,
            ip_address: row.ip_address,
            created_at: row.created_at,
        }
    }
}

/// Insertable struct for new click records. Server defaults fill the
/// timestamp columns.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = button_clicks)]
pub(crate) struct NewButtonClickRow<'a> {
    pub id: i64,
    pub action: &'a str,
    pub user_agent: &'a str,
    pub ip_address: &'a str,
}

impl<'a> From<&'a NewClickEvent> for NewButtonClickRow<'a> {
    fn from(event: &'a NewClickEvent) -> Self {
        Self {
            id: event.id.get(),
            action: &event.action,
            user_agent: &event.user_agent,
            ip_address: &event.ip_address,
        }
    }
}
