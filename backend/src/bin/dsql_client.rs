//! Create the click table, seed it when empty and print every row.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::io;
use std::sync::Arc;

use clap::Parser;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use click_recorder::cli::{SeedOutcome, render_table, run_client};
use click_recorder::config::DsqlSettings;
use click_recorder::domain::ports::PoolProfile;
use click_recorder::outbound::auth::AwsDsqlTokenIssuer;
use click_recorder::outbound::persistence::pool_context;

/// `dsql-client` command arguments.
///
/// Connection settings come from `DSQL_*` environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dsql-client",
    about = "Bootstrap the button_clicks table in Aurora DSQL and print its rows",
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
    let settings = DsqlSettings::from_env("dsql-client").map_err(io::Error::other)?;
    let cluster = settings.cluster_label().map_err(io::Error::other)?;
    let region = settings.region().map_err(io::Error::other)?;
    println!("Cluster:  {cluster}");
    println!("Region:   {region}");
    println!("Database: {}", settings.database_name());
    println!();

    let pools = pool_context(
        &settings,
        Arc::new(AwsDsqlTokenIssuer::new()),
        PoolProfile::batch(),
    )
    .map_err(io::Error::other)?;

    let report = run_client(&pools).await.map_err(io::Error::other)?;
    match report.seed {
        SeedOutcome::AlreadyPopulated(count) => {
            println!("Found {count} existing rows; no sample data inserted.");
        }
        SeedOutcome::Inserted(count) => println!("Inserted {count} sample rows."),
    }

    println!();
    print!("{}", render_table(&report.rows));
    println!();
    println!("{} rows.", report.rows.len());
    Ok(())
}
