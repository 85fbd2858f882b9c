//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Pipeline Config - Declare, validate, and publish CI build pipelines
#[derive(Parser, Debug)]
#[command(name = "pipeline-config")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a pipeline declaration and publish it to the shared repository
    Save(commands::save::SaveArgs),

    /// Validate a pipeline declaration against the hosting platform
    Check(commands::check::CheckArgs),

    /// Trigger the external pipeline generator for a user
    Generate(commands::generate::GenerateArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::new()
            .parse_filters(&self.log_level)
            .try_init()
            .ok();

        match self.command {
            Commands::Save(args) => commands::save::execute(args),
            Commands::Check(args) => commands::check::execute(args),
            Commands::Generate(args) => commands::generate::execute(args),
        }
    }
}
