//! Config command handlers.

use anyhow::{Context, Result};
use backoffice_core::config;

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    config::Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    println!("Created config at {}", config_path.display());
    Ok(())
}

pub fn venue(code: &str) -> Result<()> {
    let code = code.trim();
    if code.is_empty() {
        anyhow::bail!("Venue code cannot be empty");
    }
    let config_path = config::paths::config_path();
    config::Config::save_venue_to(&config_path, code)
        .with_context(|| format!("update config at {}", config_path.display()))?;
    println!("Venue set to {code}");
    Ok(())
}
