//! Config command implementation

use anyhow::{Context, Result};
use tally_core::config::default_config_path;
use tally_core::TallyConfig;

pub fn cmd_config(config: &TallyConfig) -> Result<()> {
    match &config.source {
        Some(path) => println!("📄 Config file: {}", path.display()),
        None => {
            println!("📄 Using built-in defaults");
            if let Some(path) = default_config_path() {
                println!("   Override by creating {}", path.display());
            }
        }
    }
    println!();

    let rendered = toml::to_string_pretty(config).context("Failed to render config")?;
    print!("{}", rendered);

    println!();
    let token_set = std::env::var("YNAB_ACCESS_TOKEN").is_ok_and(|t| !t.trim().is_empty());
    println!(
        "YNAB_ACCESS_TOKEN: {}",
        if token_set { "set" } else { "not set" }
    );

    Ok(())
}
