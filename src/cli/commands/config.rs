use anyhow::Result;
use std::path::PathBuf;

use super::Command;
use crate::config::config;

/// Print the effective configuration as TOML
pub struct ShowConfigCommand;

impl Command for ShowConfigCommand {
    async fn execute(&self) -> Result<()> {
        let rendered = toml::to_string_pretty(config()?)?;
        println!("{rendered}");
        Ok(())
    }
}

/// Write the effective configuration to a file
pub struct WriteConfigCommand {
    pub path: PathBuf,
}

impl Command for WriteConfigCommand {
    async fn execute(&self) -> Result<()> {
        config()?.save_to_file(&self.path)?;
        println!("✅ Configuration written to {}", self.path.display());
        Ok(())
    }
}
