//! Config command - show the resolved configuration

use crate::config::Config;
use crate::error::CacheResult;

/// Execute the config command
pub async fn execute(config: &Config) -> CacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
