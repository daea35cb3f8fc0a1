//! Click recorder library.
//!
//! Records and lists button click events in an Aurora DSQL cluster using
//! short-lived IAM tokens injected at connect time.

pub mod cli;
pub mod config;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
