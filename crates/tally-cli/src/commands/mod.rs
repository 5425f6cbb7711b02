//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config loading, ledger setup, statement files)
//! - `config` - Show resolved configuration
//! - `matching` - Match a bank statement against the ledger
//! - `reconcile` - Reconcile an account to a statement balance
//! - `serve` - MCP/JSON API server command

pub mod config;
pub mod core;
pub mod matching;
pub mod reconcile;
pub mod serve;

// Re-export command functions for main.rs
pub use config::*;
pub use core::*;
pub use matching::*;
pub use reconcile::*;
pub use serve::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
