//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Reconcile budget accounts against bank statements
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Bank statement matching and reconciliation for your budget", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to the data dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Budget id ("last-used" selects the most recently opened budget)
    #[arg(long, global = true, env = "TALLY_BUDGET_ID", default_value = "last-used")]
    pub budget: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Match a bank statement against an account's transactions
    Match {
        /// Account id
        #[arg(short, long)]
        account: String,

        /// Statement file (.csv or .json)
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum days between bank and ledger dates
        #[arg(short, long)]
        tolerance: Option<u32>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile an account to a statement balance
    Reconcile {
        /// Account id
        #[arg(short, long)]
        account: String,

        /// Statement ending balance (e.g. 1234.56 or -80.00)
        #[arg(long, allow_hyphen_values = true)]
        target: f64,

        /// Statement date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Report the difference without creating an adjustment transaction
        #[arg(long)]
        no_adjustment: bool,

        /// Memo for the adjustment transaction
        #[arg(long)]
        memo: Option<String>,

        /// Show what would change without writing to the ledger
        #[arg(long)]
        dry_run: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the MCP and JSON API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3030")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Show the resolved configuration
    Config,
}
