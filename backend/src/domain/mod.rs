//! Domain primitives, services and ports.
//!
//! Purpose: model click events, the memoized pool lifecycle and the failure
//! taxonomy independently of the database driver and the transport that
//! carries requests.
//!
//! Public surface:
//! - ClickService: record and list operations.
//! - PoolContext: lazily built, invalidatable pool handle.
//! - Error / ErrorCode: transport-agnostic failures.
//! - TransportFailureKind: classification of connection failures.

pub mod click_service;
pub mod error;
pub mod event;
pub mod pool_context;
pub mod ports;
pub mod transport;

pub use self::click_service::{
    AUTH_METHOD, ClickService, MOCK_DATABASE_VERSION, MockResponder, RecordReceipt,
};
pub use self::error::{Error, ErrorCode};
pub use self::event::{
    ClickEventRow, ColumnValue, DISPLAY_TIMESTAMP_FORMAT, EVENT_COLUMNS, EventColumns, EventId,
    EventOrder, NewClickEvent, RECORD_ACTION,
};
pub use self::pool_context::PoolContext;
pub use self::transport::TransportFailureKind;
