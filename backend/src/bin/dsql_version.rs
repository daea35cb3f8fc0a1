//! Print the Aurora DSQL server version.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::io;
use std::sync::Arc;

use clap::Parser;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use click_recorder::cli::{fetch_version, version_summary};
use click_recorder::config::DsqlSettings;
use click_recorder::domain::ports::PoolProfile;
use click_recorder::outbound::auth::AwsDsqlTokenIssuer;
use click_recorder::outbound::persistence::pool_context;

/// `dsql-version` command arguments.
///
/// Connection settings come from `DSQL_*` environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dsql-version",
    about = "Connect to Aurora DSQL with an IAM token and print the server version",
    version
)]
struct CliArgs {}

fn main() -> io::Result<()> {
    let _args = CliArgs::parse();
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .compact()
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let settings = DsqlSettings::from_env("dsql-version").map_err(io::Error::other)?;
    let pools = pool_context(
        &settings,
        Arc::new(AwsDsqlTokenIssuer::new()),
        PoolProfile::batch(),
    )
    .map_err(io::Error::other)?;
    println!("Connecting to Aurora DSQL at {}", pools.target().hostname);

    let version = fetch_version(&pools).await.map_err(io::Error::other)?;
    println!("Successfully connected to Aurora DSQL!");
    println!();
    println!("Database version:");
    println!("{version}");
    if let Some(summary) = version_summary(&version) {
        println!();
        println!("Version summary: {summary}");
    }
    Ok(())
}
