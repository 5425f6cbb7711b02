//! Server command implementation

use anyhow::Result;
use tally_core::{LedgerBackend, LedgerClient, TallyConfig};

pub async fn cmd_serve(
    ledger: LedgerClient,
    config: TallyConfig,
    host: &str,
    port: u16,
) -> Result<()> {
    println!("🚀 Starting Tally server...");
    println!("   Ledger: {}", ledger.host());
    println!("   JSON API: http://{}:{}/api", host, port);
    println!("   MCP server: http://{}:{}/mcp", host, port);
    if host != "127.0.0.1" && host != "localhost" {
        println!();
        println!("   ⚠️  No authentication - reconcile writes to your budget. Bind to a trusted network only!");
    }
    println!();

    tally_server::serve(ledger, config, host, port).await
}
