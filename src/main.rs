use anyhow::Result;
use clap::Parser;

use design_approval::cli::commands::config::{ShowConfigCommand, WriteConfigCommand};
use design_approval::cli::commands::seed::CheckSeedCommand;
use design_approval::cli::commands::serve::ServeCommand;
use design_approval::cli::commands::Command;
use design_approval::cli::{Cli, Commands};
use design_approval::{config, init_config, init_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_config()?;
    init_telemetry(&config()?.observability)?;

    match cli.command {
        Some(Commands::Serve { seed, bind }) => {
            tokio::runtime::Runtime::new()?.block_on(async { ServeCommand::new(seed, bind).execute().await })
        }
        Some(Commands::CheckSeed { file }) => {
            tokio::runtime::Runtime::new()?.block_on(async { CheckSeedCommand { path: file }.execute().await })
        }
        Some(Commands::ShowConfig) => {
            tokio::runtime::Runtime::new()?.block_on(async { ShowConfigCommand.execute().await })
        }
        Some(Commands::WriteConfig { file }) => {
            tokio::runtime::Runtime::new()?.block_on(async { WriteConfigCommand { path: file }.execute().await })
        }
        None => {
            tokio::runtime::Runtime::new()?.block_on(async { ServeCommand::new(None, None).execute().await })
        }
    }
}
