//! Button click events and their column representation.
//!
//! One flat table stores every click. Rows read back from storage are turned
//! into an ordered list of `(column, value)` pairs so both the JSON response
//! and the CLI table render columns in storage order.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Action literal written for every recorded click.
pub const RECORD_ACTION: &str = "record";

/// Display format shared by receipts and the CLI table.
pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column names of the events table, in storage order.
pub const EVENT_COLUMNS: [&str; 6] = [
    "id",
    "timestamp",
    "action",
    "user_agent",
    "ip_address",
    "created_at",
];

/// Primary key of a click event: the UTC epoch second of insertion.
///
/// Two clicks inside the same second collide on the primary key and the
/// second insert fails. Callers surface that as a query error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(i64);

impl EventId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Derive the identifier for an event inserted at `now`.
    pub fn from_instant(now: DateTime<Utc>) -> Self {
        Self(now.timestamp())
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Values required to insert one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClickEvent {
    pub id: EventId,
    pub action: String,
    pub user_agent: String,
    pub ip_address: String,
}

impl NewClickEvent {
    /// Build a click recorded by the request path.
    pub fn record(id: EventId, user_agent: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            id,
            action: RECORD_ACTION.to_owned(),
            user_agent: user_agent.into(),
            ip_address: ip_address.into(),
        }
    }
}

/// An event row as stored. Every column except the key is nullable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEventRow {
    pub id: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub action: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ClickEventRow {
    /// Convert into ordered column pairs.
    pub fn into_columns(self) -> EventColumns {
        let text = |value: Option<String>| value.map_or(ColumnValue::Null, ColumnValue::Text);
        let instant =
            |value: Option<DateTime<Utc>>| value.map_or(ColumnValue::Null, ColumnValue::Timestamp);

        EventColumns(vec![
            (EVENT_COLUMNS[0], ColumnValue::Integer(self.id)),
            (EVENT_COLUMNS[1], instant(self.timestamp)),
            (EVENT_COLUMNS[2], text(self.action)),
            (EVENT_COLUMNS[3], text(self.user_agent)),
            (EVENT_COLUMNS[4], text(self.ip_address)),
            (EVENT_COLUMNS[5], instant(self.created_at)),
        ])
    }
}

/// Requested ordering when listing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrder {
    /// Ascending primary key.
    ById,
    /// Most recent insertion first.
    NewestFirst,
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Null,
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl Serialize for ColumnValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(text) => serializer.serialize_str(text),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Timestamp(instant) => {
                serializer.serialize_str(&instant.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
        }
    }
}

/// Renders values the way the CLI table prints them.
impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Text(text) => f.write_str(text),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Timestamp(instant) => write!(f, "{}", instant.format(DISPLAY_TIMESTAMP_FORMAT)),
        }
    }
}

/// One row as ordered `(column, value)` pairs.
///
/// Serializes as a JSON object whose keys keep column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventColumns(Vec<(&'static str, ColumnValue)>);

impl EventColumns {
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(name, _)| *name)
    }

    pub fn values(&self) -> impl Iterator<Item = &ColumnValue> {
        self.0.iter().map(|(_, value)| value)
    }

    /// Look up a column by name.
    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.0
            .iter()
            .find(|(column, _)| *column == name)
            .map(|(_, value)| value)
    }
}

impl Serialize for EventColumns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
