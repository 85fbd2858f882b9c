//! # Repository Dependency Model
//!
//! Value objects for one build pipeline: a root repository, its dependency
//! repositories, and the per-user aggregate that owns them.
//!
//! ## Key Components
//!
//! - **`Repository`**: a dependency entry. Empty `fork`/`branch` fields are
//!   resolved from the injected [`RepositoryDefaults`] at construction time,
//!   never later. The clone URL is derived from the vcs type, fork owner and
//!   name, and stays consistent with them unless explicitly overridden.
//!
//! - **`RootRepository`**: the pipeline's primary repository. Composes a
//!   `Repository` with root-only attributes: variant suffix, target distro
//!   selection, the priority distro/arch pair, the distro x arch build
//!   matrix, the enabled job set, and the hardware targets.
//!
//! - **`PipelineDeclaration`**: the raw form payload, one YAML document per
//!   save. Per-job option objects arrive as maps of field name to
//!   `"true"`/`"false"` (the host UI's checkbox encoding); their key grammar
//!   (`__robot` and `__env` suffix markers, camelCase job names) is a fixed
//!   external contract.
//!
//! - **`UserConfiguration`**: everything serialized for one user: identity,
//!   e-mail, server name, and the ordered root repository collection.
//!
//! Construction is whole-object: each save parses a fresh declaration and
//! rebuilds the model; nothing is mutated field-by-field afterwards except
//! the explicit `set_suffix`/`set_url` escape hatches.

use crate::error::{Error, Result};
use crate::settings::Settings;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Architectures an `__env` matrix key can name. Both halves of a pair are
/// inspected so a partially filled pair never yields a lone matrix entry.
pub const MATRIX_ARCHES: [&str; 2] = ["amd64", "i386"];

const ROBOT_MARKER: &str = "__robot";
const ENV_MARKER: &str = "__env";

/// Version control system of a repository. Only Git is supported; the
/// variant exists so the wire `type` field stays an explicit contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsType {
    Git,
}

impl VcsType {
    /// Parse the declaration's `type` token.
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "git" => Ok(VcsType::Git),
            other => Err(Error::Configuration {
                message: format!("unsupported vcs type '{}'", other),
                hint: Some("only 'git' repositories can be built".to_string()),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VcsType::Git => "git",
        }
    }
}

/// Default values substituted into repository declarations that leave
/// `fork` or `branch` empty, plus the host used for derived clone URLs.
#[derive(Debug, Clone)]
pub struct RepositoryDefaults {
    pub fork: String,
    pub branch: String,
    pub git_host: String,
}

impl RepositoryDefaults {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            fork: settings.default_fork.clone(),
            branch: settings.default_branch.clone(),
            git_host: settings.git_host.clone(),
        }
    }
}

/// A dependency repository of one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Repository {
    name: String,
    fork: String,
    branch: String,
    poll: bool,
    vcs_type: VcsType,
    url: String,
    url_overridden: bool,
}

impl Repository {
    /// Build a repository from raw field values. Empty `fork` and `branch`
    /// fall back to the supplied defaults; the clone URL is derived.
    pub fn new(
        name: &str,
        fork: &str,
        branch: &str,
        poll: bool,
        vcs_type: VcsType,
        defaults: &RepositoryDefaults,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::config("repository name must not be empty"));
        }
        let fork = if fork.is_empty() {
            defaults.fork.clone()
        } else {
            fork.to_string()
        };
        let branch = if branch.is_empty() {
            defaults.branch.clone()
        } else {
            branch.to_string()
        };
        let url = derive_url(vcs_type, &defaults.git_host, &fork, name);
        Ok(Self {
            name: name.to_string(),
            fork,
            branch,
            poll,
            vcs_type,
            url,
            url_overridden: false,
        })
    }

    /// Build a dependency from its declaration block.
    pub fn from_form(form: &DependencyForm, defaults: &RepositoryDefaults) -> Result<Self> {
        let vcs_type = VcsType::parse(&form.r#type)?;
        Self::new(
            &form.name,
            &form.fork,
            &form.branch,
            form.poll,
            vcs_type,
            defaults,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fork(&self) -> &str {
        &self.fork
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn poll(&self) -> bool {
        self.poll
    }

    pub fn vcs_type(&self) -> VcsType {
        self.vcs_type
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Override the derived clone URL for a non-standard remote. After this
    /// call the URL no longer tracks fork/name changes.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
        self.url_overridden = true;
    }

    /// True once the URL has been overridden away from the derived form.
    pub fn url_overridden(&self) -> bool {
        self.url_overridden
    }
}

fn derive_url(vcs_type: VcsType, git_host: &str, fork: &str, name: &str) -> String {
    match vcs_type {
        VcsType::Git => format!("git@{}:{}/{}.git", git_host, fork, name),
    }
}

/// Ordered dependency list, deduplicated by repository name (first wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryList(Vec<Repository>);

impl RepositoryList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a repository unless one with the same name is already present.
    pub fn push(&mut self, repository: Repository) {
        if self.find(repository.name()).is_none() {
            self.0.push(repository);
        }
    }

    pub fn find(&self, name: &str) -> Option<&Repository> {
        self.0.iter().find(|r| r.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Repository> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The primary repository of one build pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RootRepository {
    repo: Repository,
    suffix: String,
    full_name: String,
    ros_distro: Vec<String>,
    prio_ubuntu_distro: String,
    prio_arch: String,
    matrix_distro_arch: BTreeMap<String, Vec<String>>,
    jobs: Vec<String>,
    robots: Vec<String>,
    repo_deps: RepositoryList,
}

impl RootRepository {
    /// Build a root repository from its declaration block. Root repositories
    /// are always polled.
    pub fn from_form(form: &RootRepositoryForm, defaults: &RepositoryDefaults) -> Result<Self> {
        let vcs_type = VcsType::parse(&form.r#type)?;
        let repo = Repository::new(
            &form.name,
            &form.fork,
            &form.branch,
            true,
            vcs_type,
            defaults,
        )?;
        let full_name = compute_full_name(repo.name(), &form.suffix);

        let mut ros_distro = Vec::new();
        for (key, value) in &form.ros_distro {
            if enabled(value) {
                ros_distro.push(key.clone());
            }
        }

        let mut jobs = Vec::new();
        let mut robots = Vec::new();
        let mut matrix_distro_arch = BTreeMap::new();
        collect_job_group(
            form.regular_build.as_ref(),
            "regular_build",
            &mut jobs,
            &mut robots,
            &mut matrix_distro_arch,
        );
        collect_job_group(
            form.downstream_build.as_ref(),
            "downstream_build",
            &mut jobs,
            &mut robots,
            &mut matrix_distro_arch,
        );
        collect_job_group(
            form.hardware_build.as_ref(),
            "hardware_build",
            &mut jobs,
            &mut robots,
            &mut matrix_distro_arch,
        );
        if form.release {
            jobs.push("release".to_string());
        }

        let mut repo_deps = RepositoryList::new();
        for dep in form.dependencies.iter().flatten() {
            repo_deps.push(Repository::from_form(dep, defaults)?);
        }

        Ok(Self {
            repo,
            suffix: form.suffix.clone(),
            full_name,
            ros_distro,
            prio_ubuntu_distro: form.prio_ubuntu_distro.clone(),
            prio_arch: form.prio_arch.clone(),
            matrix_distro_arch,
            jobs,
            robots,
            repo_deps,
        })
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn name(&self) -> &str {
        self.repo.name()
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Change the variant suffix, recomputing the full name.
    pub fn set_suffix(&mut self, suffix: impl Into<String>) {
        self.suffix = suffix.into();
        self.full_name = compute_full_name(self.repo.name(), &self.suffix);
    }

    pub fn ros_distro(&self) -> &[String] {
        &self.ros_distro
    }

    pub fn prio_ubuntu_distro(&self) -> &str {
        &self.prio_ubuntu_distro
    }

    pub fn prio_arch(&self) -> &str {
        &self.prio_arch
    }

    pub fn matrix_distro_arch(&self) -> &BTreeMap<String, Vec<String>> {
        &self.matrix_distro_arch
    }

    pub fn jobs(&self) -> &[String] {
        &self.jobs
    }

    pub fn has_job(&self, token: &str) -> bool {
        self.jobs.iter().any(|j| j == token)
    }

    pub fn robots(&self) -> &[String] {
        &self.robots
    }

    pub fn repo_deps(&self) -> &RepositoryList {
        &self.repo_deps
    }
}

fn compute_full_name(name: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        name.to_string()
    } else {
        format!("{}__{}", name, suffix)
    }
}

/// Interpret one per-job option object. The group token itself is recorded
/// whenever the object is present; enabled keys are routed by their suffix
/// marker: `__robot` keys name hardware targets, `__env` keys name
/// distro/arch matrix entries, everything else is a camelCase job name.
fn collect_job_group(
    group: Option<&Map<String, Value>>,
    token: &str,
    jobs: &mut Vec<String>,
    robots: &mut Vec<String>,
    matrix: &mut BTreeMap<String, Vec<String>>,
) {
    let Some(group) = group else {
        return;
    };
    jobs.push(token.to_string());
    for (key, value) in group {
        if !enabled(value) {
            continue;
        }
        if let Some(robot) = key.strip_suffix(ROBOT_MARKER) {
            robots.push(robot.to_string());
        } else if key.ends_with(ENV_MARKER) {
            let distro = key.split("__").next().unwrap_or_default();
            let mut arches = Vec::new();
            for arch in MATRIX_ARCHES {
                let pair_key = format!("{}__{}{}", distro, arch, ENV_MARKER);
                if group.get(&pair_key).is_some_and(enabled) {
                    arches.push(arch.to_string());
                }
            }
            matrix.insert(distro.to_string(), arches);
        } else {
            jobs.push(snake_case(key));
        }
    }
}

/// Checkbox encoding of the host UI: either a real boolean or the strings
/// `"true"`/`"false"`.
fn enabled(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

/// Convert a camelCase job key to its snake_case token
/// (`nongraphicsTest` -> `nongraphics_test`).
fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Ordered root repository collection owned by one user. Adding a second
/// entry with the same full name is rejected: the full name keys the
/// serialized document, where a collision would silently overwrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootRepositoryList(Vec<RootRepository>);

impl RootRepositoryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, repository: RootRepository) -> Result<()> {
        if self.find(repository.full_name()).is_some() {
            return Err(Error::Configuration {
                message: format!(
                    "duplicate pipeline '{}' in declaration",
                    repository.full_name()
                ),
                hint: Some("give one of the entries a distinct suffix".to_string()),
            });
        }
        self.0.push(repository);
        Ok(())
    }

    pub fn find(&self, full_name: &str) -> Option<&RootRepository> {
        self.0.iter().find(|r| r.full_name() == full_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RootRepository> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn default_true() -> bool {
    true
}

fn default_vcs() -> String {
    "git".to_string()
}

/// Declaration block for one dependency repository.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyForm {
    pub name: String,
    #[serde(default)]
    pub fork: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default = "default_true")]
    pub poll: bool,
    #[serde(default = "default_vcs")]
    pub r#type: String,
}

/// Declaration block for one root repository, mirroring the host form
/// submission field for field.
#[derive(Debug, Clone, Deserialize)]
pub struct RootRepositoryForm {
    pub name: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub fork: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default = "default_vcs")]
    pub r#type: String,
    #[serde(default)]
    pub ros_distro: Map<String, Value>,
    #[serde(default)]
    pub prio_ubuntu_distro: String,
    #[serde(default)]
    pub prio_arch: String,
    #[serde(default)]
    pub regular_build: Option<Map<String, Value>>,
    #[serde(default)]
    pub downstream_build: Option<Map<String, Value>>,
    #[serde(default)]
    pub hardware_build: Option<Map<String, Value>>,
    #[serde(default)]
    pub release: bool,
    #[serde(default)]
    pub dependencies: Vec<Option<DependencyForm>>,
}

/// The whole per-user form payload of one save.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineDeclaration {
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_true")]
    pub committer_email_enabled: bool,
    #[serde(default)]
    pub repositories: Vec<RootRepositoryForm>,
}

impl PipelineDeclaration {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

/// Per-user aggregate: identity plus the root repository collection.
#[derive(Debug, Clone)]
pub struct UserConfiguration {
    pub user_name: String,
    pub email: String,
    pub committer_email_enabled: bool,
    pub server_name: String,
    pub root_repos: RootRepositoryList,
}

impl UserConfiguration {
    /// Build the full per-user model from a parsed declaration.
    pub fn from_declaration(
        declaration: &PipelineDeclaration,
        settings: &Settings,
    ) -> Result<Self> {
        if declaration.user_name.is_empty() {
            return Err(Error::config("user_name must not be empty"));
        }
        let defaults = RepositoryDefaults::from_settings(settings);
        let mut root_repos = RootRepositoryList::new();
        for form in &declaration.repositories {
            root_repos.add(RootRepository::from_form(form, &defaults)?)?;
        }
        Ok(Self {
            user_name: declaration.user_name.clone(),
            email: declaration.email.clone(),
            committer_email_enabled: declaration.committer_email_enabled,
            server_name: settings.server_name()?,
            root_repos,
        })
    }
}
