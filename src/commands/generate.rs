//! # Generate Command Implementation
//!
//! This module implements the `generate` subcommand: wait until the user's
//! persisted configuration record is fresh on disk, then invoke the external
//! pipeline generator and report its status.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use pipeline_config::generate::{DiskStat, FreshnessWait, GenerationTrigger, SystemClock};
use pipeline_config::settings::Settings;

/// Trigger the external pipeline generator for a user
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Path to the host settings YAML file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "PIPELINE_CONFIG_SETTINGS",
        default_value = "pipeline-settings.yaml"
    )]
    pub settings: PathBuf,

    /// User id whose pipeline should be regenerated.
    #[arg(short, long, value_name = "ID")]
    pub user: String,
}

/// Execute the `generate` command.
pub fn execute(args: GenerateArgs) -> Result<()> {
    let settings = Settings::load(&args.settings)?;

    let clock = SystemClock;
    let stat = DiskStat;
    let wait = FreshnessWait::new(&clock, &stat);
    let status = GenerationTrigger::new(&settings).trigger(&args.user, &wait)?;

    println!("{}", status.message);
    if !status.is_success() {
        anyhow::bail!("generator reported failure");
    }
    Ok(())
}
