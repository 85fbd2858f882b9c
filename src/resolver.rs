//! # Platform Resolver
//!
//! Answers two questions about the hosted Git platform: "what
//! repositories/forks/branches exist" (combo-list suggestions) and "is this
//! choice valid" (form validation). Both answers are derived from the same
//! candidate sets so suggestion and acceptance can never disagree.
//!
//! ## Design
//!
//! The resolver talks to the platform through the [`PlatformClient`] trait.
//! In production that is the reqwest-backed [`crate::github::GithubClient`];
//! tests substitute a scripted fake to exercise the fallback chains without
//! network access.
//!
//! Every `validate_*` operation returns a [`Verdict`] rather than an error:
//! remote failures are caught at this boundary and folded into the verdict
//! message, so callers only ever branch on ok/warning/error.
//!
//! The fork-owner suggestion list is an explicit ordered fallback chain
//! (parent's forks, then the repository's own forks, then forks under the
//! globally configured login), each step attempted only when the previous
//! produced no candidates.

use crate::error::Result;
use crate::model::{RootRepository, MATRIX_ARCHES};
use crate::settings::Settings;
use std::fmt;

/// A repository as reported by the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub name: String,
    pub owner: String,
    pub private: bool,
    pub fork: bool,
    /// `(owner, name)` of the parent when this repository is itself a fork.
    pub parent: Option<(String, String)>,
}

/// A user or organization account on the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccount {
    pub login: String,
    pub name: Option<String>,
    pub public_repos: u64,
    pub private_repos: u64,
}

/// A team within an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTeam {
    pub id: u64,
    pub name: String,
    pub repos_count: u64,
}

/// Minimal listing operations against the hosting platform.
pub trait PlatformClient {
    /// Repositories owned by (or accessible to) `owner`.
    fn repositories(&self, owner: &str) -> Result<Vec<RemoteRepository>>;

    /// A single repository, including fork parentage.
    fn repository(&self, owner: &str, name: &str) -> Result<RemoteRepository>;

    /// Forks of `owner/name`.
    fn forks(&self, owner: &str, name: &str) -> Result<Vec<RemoteRepository>>;

    /// Branch names of `owner/name`.
    fn branches(&self, owner: &str, name: &str) -> Result<Vec<String>>;

    /// A user account.
    fn user(&self, login: &str) -> Result<RemoteAccount>;

    /// An organization account.
    fn organization(&self, login: &str) -> Result<RemoteAccount>;

    /// Teams of an organization.
    fn teams(&self, org: &str) -> Result<Vec<RemoteTeam>>;

    /// Repositories accessible to a team.
    fn team_repositories(&self, team_id: u64) -> Result<Vec<RemoteRepository>>;
}

/// Outcome of a field validation: accepted, accepted-with-caveat ("not yet
/// filled" style guidance), or rejected. Remote failures surface here as
/// error verdicts, never as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ok { message: Option<String> },
    Warning { message: String },
    Error { message: String },
}

impl Verdict {
    pub fn ok() -> Self {
        Verdict::Ok { message: None }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Verdict::Ok {
            message: Some(message.into()),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Verdict::Warning {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Verdict::Error {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok { .. })
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Verdict::Warning { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Verdict::Error { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ok { message: None } => write!(f, "ok"),
            Verdict::Ok {
                message: Some(message),
            } => write!(f, "ok: {}", message),
            Verdict::Warning { message } => write!(f, "warning: {}", message),
            Verdict::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// Resolves repository/fork/branch choices against the hosting platform.
pub struct Resolver<'a> {
    client: &'a dyn PlatformClient,
    settings: &'a Settings,
}

impl<'a> Resolver<'a> {
    pub fn new(client: &'a dyn PlatformClient, settings: &'a Settings) -> Self {
        Self { client, settings }
    }

    /// Repository names owned by `scope_owner`, sorted and deduplicated.
    /// When the scope owner is the configured organization and a team is
    /// configured, the team's repositories are listed instead. Failures and
    /// an empty scope owner both yield an empty list.
    pub fn list_repository_names(&self, scope_owner: &str) -> Vec<String> {
        if scope_owner.is_empty() {
            return Vec::new();
        }
        let repos = self
            .team_scope_repositories(scope_owner)
            .or_else(|| self.client.repositories(scope_owner).ok())
            .unwrap_or_default();
        let mut names: Vec<String> = Vec::new();
        for repo in repos {
            if !names.contains(&repo.name) {
                names.push(repo.name);
            }
        }
        names.sort();
        names
    }

    fn team_scope_repositories(&self, scope_owner: &str) -> Option<Vec<RemoteRepository>> {
        let team_name = self.settings.github_team.as_deref()?;
        if scope_owner != self.settings.github_org {
            return None;
        }
        let teams = self.client.teams(scope_owner).ok()?;
        let team = teams.into_iter().find(|t| t.name == team_name)?;
        self.client.team_repositories(team.id).ok()
    }

    /// Validate a repository name against `scope_owner`'s listing, falling
    /// back to a live existence probe for unlisted (external) repositories.
    pub fn validate_repository_name(&self, name: &str, scope_owner: &str) -> Verdict {
        if scope_owner.is_empty() {
            return Verdict::error("no fork owner given for the repository");
        }
        if name.is_empty() {
            return Verdict::warning("repository name not set yet");
        }
        if self
            .list_repository_names(scope_owner)
            .iter()
            .any(|n| n == name)
        {
            return Verdict::ok();
        }
        match self.client.repository(scope_owner, name) {
            Ok(repo) if repo.private => Verdict::ok_with("repository found (private)"),
            Ok(_) => Verdict::ok_with("repository found"),
            Err(_) => Verdict::error(format!(
                "repository '{}' not found for owner '{}'",
                name, scope_owner
            )),
        }
    }

    /// Fork owners that plausibly carry `name`, base owner first, remainder
    /// sorted. The base owner is present even when every platform query
    /// fails.
    pub fn list_fork_owners(&self, base_owner: &str, name: &str) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();

        // Step 1: the repository is itself a fork - offer its parent's forks.
        if let Ok(repo) = self.client.repository(base_owner, name) {
            if let Some((parent_owner, parent_name)) = &repo.parent {
                if let Ok(forks) = self.client.forks(parent_owner, parent_name) {
                    candidates.extend(forks.into_iter().map(|f| f.owner));
                }
            }
        }

        // Step 2: forks of the repository directly.
        if candidates.is_empty() {
            if let Ok(forks) = self.client.forks(base_owner, name) {
                candidates.extend(forks.into_iter().map(|f| f.owner));
            }
        }

        // Step 3: forks found under the globally configured login.
        if candidates.is_empty() {
            if let Ok(forks) = self.client.forks(&self.settings.github_login, name) {
                candidates.extend(forks.into_iter().map(|f| f.owner));
            }
        }

        let mut owners = vec![base_owner.to_string()];
        candidates.sort();
        for candidate in candidates {
            if !owners.contains(&candidate) {
                owners.push(candidate);
            }
        }
        owners
    }

    /// Validate a fork owner: the account must exist and must own a
    /// repository called `name`. Each failure mode is a distinct error so
    /// the caller can show a precise message.
    pub fn validate_fork_owner(&self, owner: &str, name: &str) -> Verdict {
        if owner.is_empty() {
            return Verdict::error(format!(
                "no fork owner set; the configured default is '{}'",
                self.settings.default_fork
            ));
        }
        if let Err(err) = self.client.user(owner) {
            return Verdict::error(format!("fork owner '{}' not found\n{}", owner, err));
        }
        match self.client.repositories(owner) {
            Err(err) => Verdict::error(format!(
                "could not list repositories of '{}'\n{}",
                owner, err
            )),
            Ok(repos) if repos.iter().any(|r| r.name == name) => Verdict::ok_with("fork found"),
            Ok(_) => Verdict::error(format!("'{}' has no repository '{}'", owner, name)),
        }
    }

    /// Branch names of `owner/name`, sorted; empty on any failure.
    pub fn list_branches(&self, owner: &str, name: &str) -> Vec<String> {
        if owner.is_empty() {
            return Vec::new();
        }
        let mut branches = self.client.branches(owner, name).unwrap_or_default();
        branches.sort();
        branches
    }

    /// Validate a branch choice against the listed branch set.
    pub fn validate_branch(&self, value: &str, owner: &str, name: &str) -> Verdict {
        if value.is_empty() {
            return Verdict::error("no branch set");
        }
        if self.list_branches(owner, name).iter().any(|b| b == value) {
            Verdict::ok()
        } else {
            Verdict::error(format!("branch '{}' not found", value))
        }
    }

    /// Validate the configured organization exists.
    pub fn validate_organization(&self, org: &str) -> Verdict {
        if org.is_empty() {
            return Verdict::error("no organization name given");
        }
        match self.client.organization(org) {
            Ok(account) => Verdict::ok_with(format!(
                "organization owns {} public and {} private repositories",
                account.public_repos, account.private_repos
            )),
            Err(err) => Verdict::error(format!("organization '{}' does not exist\n{}", org, err)),
        }
    }

    /// Validate the configured platform login exists.
    pub fn validate_login(&self, login: &str) -> Verdict {
        if login.is_empty() {
            return Verdict::error("no login name given");
        }
        match self.client.user(login) {
            Ok(_) => Verdict::ok(),
            Err(err) => Verdict::error(format!("user '{}' does not exist\n{}", login, err)),
        }
    }

    /// Validate the configured credentials by fetching the authenticated
    /// account itself.
    pub fn validate_credentials(&self, login: &str) -> Verdict {
        match self.client.user(login) {
            Ok(account) => Verdict::ok_with(format!(
                "authenticated as {}; {} public and {} private repositories",
                account.name.as_deref().unwrap_or(&account.login),
                account.public_repos,
                account.private_repos
            )),
            Err(err) => Verdict::error(format!("credentials rejected\n{}", err)),
        }
    }

    /// Validate the configured team exists within the organization.
    pub fn validate_team(&self, team: &str, org: &str) -> Verdict {
        if team.is_empty() {
            return Verdict::error("no team name given");
        }
        match self.client.teams(org) {
            Ok(teams) => match teams.iter().find(|t| t.name == team) {
                Some(found) => {
                    Verdict::ok_with(format!("team owns {} repositories", found.repos_count))
                }
                None => Verdict::error(format!(
                    "team '{}' not found; make sure the configured login is a member",
                    team
                )),
            },
            Err(err) => Verdict::error(format!("could not list teams of '{}'\n{}", org, err)),
        }
    }
}

/// Offline verdicts for a root repository's build-target choices against
/// the host's configured distro list, target matrix, and robot fleet. No
/// platform queries are involved; a host list left empty skips its check.
pub fn validate_build_targets(
    root: &RootRepository,
    settings: &Settings,
) -> Vec<(String, Verdict)> {
    let mut verdicts = Vec::new();

    if !settings.ros_distros.is_empty() {
        for distro in root.ros_distro() {
            let verdict = if settings.ros_distros.contains(distro) {
                Verdict::ok()
            } else {
                Verdict::error(format!(
                    "ros distro '{}' is not offered by this host",
                    distro
                ))
            };
            verdicts.push((format!("ros distro '{}'", distro), verdict));
        }
    }

    let releases = settings.ubuntu_releases();
    let prio = root.prio_ubuntu_distro();
    if !releases.is_empty() && !prio.is_empty() {
        let verdict = if !releases.iter().any(|r| r == prio) {
            Verdict::error(format!("'{}' is not a target ubuntu release", prio))
        } else {
            let supported = settings.supported_ros(prio);
            let unbuildable: Vec<&str> = root
                .ros_distro()
                .iter()
                .filter(|d| !supported.contains(d))
                .map(String::as_str)
                .collect();
            if unbuildable.is_empty() {
                Verdict::ok()
            } else {
                Verdict::error(format!(
                    "ros distro(s) {} are not built on '{}'",
                    unbuildable.join(", "),
                    prio
                ))
            }
        };
        verdicts.push((format!("priority ubuntu distro '{}'", prio), verdict));
    }

    let arch = root.prio_arch();
    if !arch.is_empty() {
        let verdict = if MATRIX_ARCHES.contains(&arch) {
            Verdict::ok()
        } else {
            Verdict::error(format!("unknown architecture '{}'", arch))
        };
        verdicts.push((format!("priority arch '{}'", arch), verdict));
    }

    if !settings.robots.is_empty() {
        for robot in root.robots() {
            let verdict = if settings.robots.contains(robot) {
                Verdict::ok()
            } else {
                Verdict::error(format!("robot '{}' is not available on this host", robot))
            };
            verdicts.push((format!("robot '{}'", robot), verdict));
        }
    }

    verdicts
}
