//! Tally CLI - Bank statement reconciliation
//!
//! Usage:
//!   tally match --account ID --file statement.csv     Match statement lines
//!   tally reconcile --account ID --target 120.00 --date 2024-03-31
//!   tally serve --port 3030                           Start MCP server
//!   tally config                                      Show resolved config

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Match {
            account,
            file,
            tolerance,
            json,
        } => {
            let ledger = commands::open_ledger(&config)?;
            commands::cmd_match(&ledger, &config, &cli.budget, &account, &file, tolerance, json)
                .await
        }
        Commands::Reconcile {
            account,
            target,
            date,
            no_adjustment,
            memo,
            dry_run,
            json,
        } => {
            let ledger = commands::open_ledger(&config)?;
            let options = commands::ReconcileOptions {
                budget_id: cli.budget,
                account_id: account,
                target,
                date,
                create_adjustment: !no_adjustment,
                memo,
                dry_run,
            };
            commands::cmd_reconcile(&ledger, &config, options, json).await
        }
        Commands::Serve { port, host } => {
            let ledger = commands::open_ledger(&config)?;
            commands::cmd_serve(ledger, config, &host, port).await
        }
        Commands::Config => commands::cmd_config(&config),
    }
}
