//! # Save Command Implementation
//!
//! This module implements the `save` subcommand: parse the user's pipeline
//! declaration, render the canonical configuration document, and publish it
//! into the shared configuration repository.
//!
//! ## Functionality
//!
//! - **Render**: the declaration is resolved against the host settings
//!   (default fork and branch substitution, job-option parsing) and
//!   serialized into `pipeline_config.yaml`.
//! - **Publish**: the synchronization pipeline writes the document locally
//!   and pushes it to the shared repository. Stage failures after the local
//!   write are reported but do not fail the save; the next save retries
//!   them implicitly.
//! - **Generate** (`--generate`): after publishing, wait for the persisted
//!   record to settle and invoke the external pipeline generator.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use pipeline_config::generate::{DiskStat, FreshnessWait, GenerationTrigger, SystemClock};
use pipeline_config::model::{PipelineDeclaration, UserConfiguration};
use pipeline_config::serializer;
use pipeline_config::settings::Settings;
use pipeline_config::sync::SyncPipeline;

/// Render a pipeline declaration and publish it to the shared repository
#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Path to the host settings YAML file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "PIPELINE_CONFIG_SETTINGS",
        default_value = "pipeline-settings.yaml"
    )]
    pub settings: PathBuf,

    /// Path to the user's pipeline declaration YAML file.
    #[arg(short, long, value_name = "FILE")]
    pub declaration: PathBuf,

    /// Trigger the external generator after publishing.
    #[arg(long)]
    pub generate: bool,
}

/// Execute the `save` command.
pub fn execute(args: SaveArgs) -> Result<()> {
    let settings = Settings::load(&args.settings)?;
    let declaration = PipelineDeclaration::load(&args.declaration)?;
    let user = UserConfiguration::from_declaration(&declaration, &settings)?;
    let yaml = serializer::render(&user).to_yaml()?;

    let pipeline = SyncPipeline::new(&settings);
    let report = pipeline.synchronize(&yaml, &user.user_name)?;

    for outcome in &report.outcomes {
        match &outcome.detail {
            None => println!("  {}: ok", outcome.stage),
            Some(detail) => println!("  {}: failed ({})", outcome.stage, detail),
        }
    }
    if report.fully_synchronized() {
        println!("✅ Pipeline configuration for '{}' published", user.user_name);
    } else {
        println!(
            "⚠️  Saved with incomplete synchronization; the next save retries the failed stages"
        );
    }

    if args.generate {
        let clock = SystemClock;
        let stat = DiskStat;
        let wait = FreshnessWait::new(&clock, &stat);
        let status = GenerationTrigger::new(&settings).trigger(&user.user_name, &wait)?;
        println!("{}", status.message);
        if !status.is_success() {
            anyhow::bail!("generator reported failure");
        }
    }

    Ok(())
}
