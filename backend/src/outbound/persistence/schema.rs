//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the bootstrap DDL in `bootstrap.rs` exactly.
//! They are used by Diesel for compile-time query validation and type-safe
//! SQL generation.

diesel::table! {
    /// Button click events.
    ///
    /// One row per recorded click. The primary key is the UTC epoch second at
    /// insertion time.
    button_clicks (id) {
        /// Primary key: epoch seconds.
        id -> Int8,
        /// Event time, defaulted by the server.
        timestamp -> Nullable<Timestamptz>,
        /// Action literal (max 100 characters).
        action -> Nullable<Varchar>,
        /// Client user agent.
        user_agent -> Nullable<Text>,
        /// Client address; 45 characters fits any textual IPv6 form.
        ip_address -> Nullable<Varchar>,
        /// Row creation time, defaulted by the server.
        created_at -> Nullable<Timestamptz>,
    }
}
