use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "design-approval")]
#[command(about = "Design approval workflow with a client portal")]
#[command(long_about = "Tracks packaging and print designs through internal checklist validation \
                       and client approval. Start the portal with 'design-approval serve'.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the client portal (default when no command is given)
    Serve {
        /// Seed file with partners, users and checklist templates
        #[arg(long, help = "TOML seed file applied to the store before serving")]
        seed: Option<PathBuf>,
        /// Address to listen on
        #[arg(long, help = "Override portal.bind_addr, e.g. 0.0.0.0:8080")]
        bind: Option<String>,
    },
    /// Validate a seed file and report every problem found
    CheckSeed {
        /// Seed file to check
        file: PathBuf,
    },
    /// Print the effective configuration
    ShowConfig,
    /// Write the effective configuration to a TOML file
    WriteConfig {
        /// Destination file
        #[arg(default_value = "design-approval.toml")]
        file: PathBuf,
    },
}
