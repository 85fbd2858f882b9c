//! # Global Settings
//!
//! This module defines the host-wide configuration consumed by the resolver,
//! the serializer, and the synchronization pipeline. The settings value is
//! loaded once (from a YAML file) and passed explicitly into every component
//! constructor; no component reads global state on its own.
//!
//! ## Contents
//!
//! - Platform credentials and scoping (`github_login`, `github_password`,
//!   `github_org`, optional `github_team`).
//! - Default fork owner and branch applied to repository declarations that
//!   leave those fields empty.
//! - The CI server's externally visible root URL, from which the server
//!   identity used in the shared repository layout is derived.
//! - The shared configuration repository URL and the local working directory.
//! - The target platform matrix (ROS distro -> Ubuntu releases), either
//!   inlined or fetched from `targets_url`.
//! - Generator process location and its tarball argument.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Target platform matrix: one entry per ROS distro, mapping the distro name
/// to the Ubuntu releases it is built on. The pseudo-distro `backports` is
/// carried in the file but excluded from release queries.
pub type TargetMatrix = Vec<BTreeMap<String, Vec<String>>>;

/// Host-wide configuration, deserialized from a YAML settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Login used for authenticated platform queries.
    pub github_login: String,
    /// Credential paired with `github_login`.
    pub github_password: String,
    /// Organization owning the canonical upstream repositories.
    pub github_org: String,
    /// Optional team whose repositories scope name suggestions.
    #[serde(default)]
    pub github_team: Option<String>,
    /// Fork owner substituted when a declaration leaves `fork` empty.
    pub default_fork: String,
    /// Branch substituted when a declaration leaves `branch` empty.
    pub default_branch: String,
    /// Host used when deriving SSH clone URLs.
    #[serde(default = "default_git_host")]
    pub git_host: String,
    /// Externally visible root URL of this CI server.
    pub root_url: String,
    /// URL of the shared configuration repository.
    pub config_repo_url: String,
    /// Supported ROS distributions offered to pipeline declarations.
    #[serde(default)]
    pub ros_distros: Vec<String>,
    /// Hardware targets available for on-robot jobs.
    #[serde(default)]
    pub robots: Vec<String>,
    /// Optional URL of the target platform matrix YAML.
    #[serde(default)]
    pub targets_url: Option<String>,
    /// Target platform matrix, inlined or populated via `fetch_targets`.
    #[serde(default)]
    pub targets: TargetMatrix,
    /// Path of the external pipeline generator executable.
    pub generator_path: PathBuf,
    /// Tarball location handed to the generator.
    pub tarball_location: String,
    /// Local working directory for per-user documents and the shared clone.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
}

fn default_git_host() -> String {
    "github.com".to_string()
}

/// Platform-appropriate data directory, with a relative fallback when the
/// platform directory cannot be determined.
fn default_workdir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".pipeline-config"))
        .join("pipeline-config")
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse settings from a YAML string.
    pub fn parse(raw: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(raw)?;
        if settings.default_fork.is_empty() {
            return Err(Error::Configuration {
                message: "default_fork must not be empty".to_string(),
                hint: Some("set default_fork to the organization or user owning the canonical forks".to_string()),
            });
        }
        if settings.default_branch.is_empty() {
            return Err(Error::Configuration {
                message: "default_branch must not be empty".to_string(),
                hint: Some("set default_branch to the branch built when a declaration names none".to_string()),
            });
        }
        Ok(settings)
    }

    /// Derive the server identity used as the top-level directory in the
    /// shared configuration repository: the root URL with scheme and port
    /// stripped, keeping a non-root path.
    pub fn server_name(&self) -> Result<String> {
        let url = Url::parse(&self.root_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::config(format!("root_url '{}' has no host", self.root_url)))?;
        let path = url.path().trim_end_matches('/');
        Ok(format!("{}{}", host, path))
    }

    /// Ubuntu releases covered by the target matrix, in first-seen order,
    /// excluding the `backports` pseudo-entry.
    pub fn ubuntu_releases(&self) -> Vec<String> {
        let mut releases = Vec::new();
        for entry in &self.targets {
            for (ros, ubuntus) in entry {
                if ros == "backports" {
                    continue;
                }
                for ubuntu in ubuntus {
                    if !releases.contains(ubuntu) {
                        releases.push(ubuntu.clone());
                    }
                }
            }
        }
        releases
    }

    /// ROS distros built on the given Ubuntu release, excluding `backports`.
    pub fn supported_ros(&self, ubuntu: &str) -> Vec<String> {
        let mut distros = Vec::new();
        for entry in &self.targets {
            for (ros, ubuntus) in entry {
                if ros != "backports" && ubuntus.iter().any(|u| u == ubuntu) {
                    distros.push(ros.clone());
                }
            }
        }
        distros
    }

    /// Fetch the target platform matrix from `targets_url`, replacing any
    /// inlined matrix. A missing `targets_url` leaves the matrix untouched.
    pub fn fetch_targets(&mut self) -> Result<()> {
        let Some(url) = &self.targets_url else {
            return Ok(());
        };
        let body = reqwest::blocking::get(url)?.error_for_status()?.text()?;
        self.targets = serde_yaml::from_str(&body)?;
        Ok(())
    }
}

/// Shared settings fixture for unit tests across the crate.
#[cfg(test)]
pub(crate) const EXAMPLE_SETTINGS_YAML: &str = r#"
github_login: jenkins-bot
github_password: hunter2
github_org: ipa320
github_team: care-o-bot
default_fork: ipa320
default_branch: master
root_url: http://build.example.org:8080/
config_repo_url: git@github.com:ipa320/jenkins_config.git
ros_distros: [fuerte, groovy, hydro, indigo]
robots: [cob3-3, cob4, raw3-1]
targets:
  - electric: [lucid, natty]
  - fuerte: [lucid, precise]
  - hydro: [precise]
  - backports: [precise]
generator_path: /opt/jenkins/generation/run.py
tarball_location: /var/lib/jenkins/tarballs
workdir: /var/lib/jenkins
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS_YAML: &str = r#"
github_login: jenkins-bot
github_password: hunter2
github_org: ipa320
github_team: care-o-bot
default_fork: ipa320
default_branch: master
root_url: http://build.example.org:8080/
config_repo_url: git@github.com:ipa320/jenkins_config.git
ros_distros: [fuerte, groovy, hydro, indigo]
robots: [cob3-3, cob4, raw3-1]
targets:
  - electric: [lucid, natty]
  - fuerte: [lucid, precise]
  - hydro: [precise]
  - backports: [precise]
generator_path: /opt/jenkins/generation/run.py
tarball_location: /var/lib/jenkins/tarballs
workdir: /var/lib/jenkins
"#;

    #[test]
    fn test_parse_settings() {
        let settings = Settings::parse(SETTINGS_YAML).unwrap();
        assert_eq!(settings.github_login, "jenkins-bot");
        assert_eq!(settings.github_team.as_deref(), Some("care-o-bot"));
        assert_eq!(settings.default_branch, "master");
        assert_eq!(settings.git_host, "github.com");
        assert_eq!(settings.robots.len(), 3);
        assert_eq!(settings.workdir, PathBuf::from("/var/lib/jenkins"));
    }

    #[test]
    fn test_parse_rejects_empty_default_fork() {
        let raw = SETTINGS_YAML.replace("default_fork: ipa320", "default_fork: \"\"");
        let err = Settings::parse(&raw).unwrap_err();
        assert!(err.to_string().contains("default_fork"));
    }

    #[test]
    fn test_server_name_strips_scheme_and_port() {
        let settings = Settings::parse(SETTINGS_YAML).unwrap();
        assert_eq!(settings.server_name().unwrap(), "build.example.org");
    }

    #[test]
    fn test_server_name_keeps_non_root_path() {
        let mut settings = Settings::parse(SETTINGS_YAML).unwrap();
        settings.root_url = "https://ci.example.org:8443/jenkins/".to_string();
        assert_eq!(settings.server_name().unwrap(), "ci.example.org/jenkins");
    }

    #[test]
    fn test_ubuntu_releases_excludes_backports_and_dedups() {
        let settings = Settings::parse(SETTINGS_YAML).unwrap();
        assert_eq!(settings.ubuntu_releases(), vec!["lucid", "natty", "precise"]);
    }

    #[test]
    fn test_supported_ros_for_release() {
        let settings = Settings::parse(SETTINGS_YAML).unwrap();
        assert_eq!(settings.supported_ros("precise"), vec!["fuerte", "hydro"]);
        assert_eq!(settings.supported_ros("lucid"), vec!["electric", "fuerte"]);
        assert!(settings.supported_ros("trusty").is_empty());
    }

    #[test]
    fn test_fetch_targets_noop_without_url() {
        let mut settings = Settings::parse(SETTINGS_YAML).unwrap();
        let before = settings.targets.clone();
        settings.fetch_targets().unwrap();
        assert_eq!(settings.targets, before);
    }
}
