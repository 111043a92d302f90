use anyhow::Result;
use panverify_core::AppConfig;

use crate::error::Exit;

/// Execute the `config` command: print the merged configuration.
pub fn execute(config: &AppConfig) -> Result<Exit> {
    print!("{}", config.to_toml()?);
    Ok(Exit::Success)
}
