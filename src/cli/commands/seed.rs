use anyhow::Result;
use std::path::PathBuf;

use super::Command;
use crate::seed::SeedFile;

/// Validate a seed file without touching any store
pub struct CheckSeedCommand {
    pub path: PathBuf,
}

impl Command for CheckSeedCommand {
    async fn execute(&self) -> Result<()> {
        print!("🔍 Checking {}... ", self.path.display());
        let seed = SeedFile::load(&self.path)?;
        println!("✅");
        println!("   Partners:  {}", seed.partners.len());
        println!("   Users:     {}", seed.users.len());
        println!("   Templates: {}", seed.templates.len());
        Ok(())
    }
}
