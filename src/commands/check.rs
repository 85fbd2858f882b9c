//! # Check Command Implementation
//!
//! This module implements the `check` subcommand, which validates a pipeline
//! declaration against the hosting platform without modifying any state.
//!
//! ## Functionality
//!
//! - **Credential validation**: the configured login, organization, and
//!   (when set) team are verified once up front.
//! - **Declaration validation**: for every root repository and dependency,
//!   the repository name (within its declared fork's scope), fork owner,
//!   and branch are validated through the resolver; each verdict is
//!   printed. Warnings do not fail the check, error verdicts do.
//! - **Build-target validation**: each root's ros distros, priority
//!   ubuntu/arch pair, and robots are checked against the host's configured
//!   distro list, target matrix (fetched from `targets_url` when set), and
//!   robot fleet.
//!
//! This command is a safe, read-only operation.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use pipeline_config::github::GithubClient;
use pipeline_config::model::{PipelineDeclaration, Repository, UserConfiguration};
use pipeline_config::resolver::{validate_build_targets, Resolver, Verdict};
use pipeline_config::settings::Settings;

/// Validate a pipeline declaration against the hosting platform
#[derive(Args, Debug)]
pub struct CheckArgs {
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
}

fn repo_verdicts(resolver: &Resolver, prefix: &str, repo: &Repository) -> Vec<(String, Verdict)> {
    vec![
        (
            format!("{} repository '{}'", prefix, repo.name()),
            resolver.validate_repository_name(repo.name(), repo.fork()),
        ),
        (
            format!("{} fork owner '{}'", prefix, repo.fork()),
            resolver.validate_fork_owner(repo.fork(), repo.name()),
        ),
        (
            format!("{} branch '{}'", prefix, repo.branch()),
            resolver.validate_branch(repo.branch(), repo.fork(), repo.name()),
        ),
    ]
}

/// Execute the `check` command.
pub fn execute(args: CheckArgs) -> Result<()> {
    let mut settings = Settings::load(&args.settings)?;
    settings.fetch_targets()?;
    let declaration = PipelineDeclaration::load(&args.declaration)?;
    let user = UserConfiguration::from_declaration(&declaration, &settings)?;

    let client = GithubClient::new(&settings);
    let resolver = Resolver::new(&client, &settings);

    let mut verdicts: Vec<(String, Verdict)> = vec![
        (
            "credentials".to_string(),
            resolver.validate_credentials(&settings.github_login),
        ),
        (
            format!("organization '{}'", settings.github_org),
            resolver.validate_organization(&settings.github_org),
        ),
    ];
    if let Some(team) = &settings.github_team {
        verdicts.push((
            format!("team '{}'", team),
            resolver.validate_team(team, &settings.github_org),
        ));
    }

    for root in user.root_repos.iter() {
        let prefix = format!("'{}' root", root.full_name());
        verdicts.extend(repo_verdicts(&resolver, &prefix, root.repo()));
        for dep in root.repo_deps().iter() {
            let prefix = format!("'{}' dependency '{}'", root.full_name(), dep.name());
            verdicts.extend(repo_verdicts(&resolver, &prefix, dep));
        }
        for (label, verdict) in validate_build_targets(root, &settings) {
            verdicts.push((format!("'{}' {}", root.full_name(), label), verdict));
        }
    }

    let mut errors = 0usize;
    for (label, verdict) in &verdicts {
        if verdict.is_error() {
            errors += 1;
        }
        println!("  {}: {}", label, verdict);
    }

    if errors > 0 {
        anyhow::bail!("{} validation error(s)", errors);
    }
    println!("✅ Declaration is valid");
    Ok(())
}
