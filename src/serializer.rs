//! # Config Serializer
//!
//! Renders the in-memory per-user model into the canonical
//! `pipeline_config.yaml` document. The field names here are the wire
//! contract consumed by the external generator; nothing is transformed
//! beyond a direct field copy. Repositories are keyed by the root's full
//! name and dependencies by their name, so the uniqueness rules enforced in
//! the model are the only protection against silent key collisions.
//!
//! `BTreeMap` keys the mappings so repeated renders of the same model are
//! byte-identical, which keeps the shared repository's history free of
//! spurious diffs.

use crate::error::Result;
use crate::model::{Repository, RootRepository, UserConfiguration};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One dependency entry of the wire document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyDocument {
    pub r#type: String,
    pub url: String,
    /// Branch name; historically called `version` on the wire.
    pub version: String,
    pub poll: bool,
}

/// One pipeline entry of the wire document, keyed by the root's full name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootRepositoryDocument {
    pub r#type: String,
    pub url: String,
    pub version: String,
    pub poll: bool,
    pub ros_distro: Vec<String>,
    pub prio_ubuntu_distro: String,
    pub prio_arch: String,
    pub matrix_distro_arch: BTreeMap<String, Vec<String>>,
    pub jobs: Vec<String>,
    pub robots: Vec<String>,
    pub dependencies: BTreeMap<String, DependencyDocument>,
}

/// The complete per-user configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDocument {
    pub user_name: String,
    pub server_name: String,
    pub email: String,
    pub committer_email_enabled: bool,
    pub repositories: BTreeMap<String, RootRepositoryDocument>,
}

impl PipelineDocument {
    /// Parse a previously rendered document.
    pub fn parse(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn render_dependency(dep: &Repository) -> DependencyDocument {
    DependencyDocument {
        r#type: dep.vcs_type().as_str().to_string(),
        url: dep.url().to_string(),
        version: dep.branch().to_string(),
        poll: dep.poll(),
    }
}

fn render_root(root: &RootRepository) -> RootRepositoryDocument {
    let dependencies = root
        .repo_deps()
        .iter()
        .map(|dep| (dep.name().to_string(), render_dependency(dep)))
        .collect();
    RootRepositoryDocument {
        r#type: root.repo().vcs_type().as_str().to_string(),
        url: root.repo().url().to_string(),
        version: root.repo().branch().to_string(),
        poll: root.repo().poll(),
        ros_distro: root.ros_distro().to_vec(),
        prio_ubuntu_distro: root.prio_ubuntu_distro().to_string(),
        prio_arch: root.prio_arch().to_string(),
        matrix_distro_arch: root.matrix_distro_arch().clone(),
        jobs: root.jobs().to_vec(),
        robots: root.robots().to_vec(),
        dependencies,
    }
}

/// Render the user's configuration into the wire document.
pub fn render(user: &UserConfiguration) -> PipelineDocument {
    let repositories = user
        .root_repos
        .iter()
        .map(|root| (root.full_name().to_string(), render_root(root)))
        .collect();
    PipelineDocument {
        user_name: user.user_name.clone(),
        server_name: user.server_name.clone(),
        email: user.email.clone(),
        committer_email_enabled: user.committer_email_enabled,
        repositories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PipelineDeclaration, UserConfiguration};
    use crate::settings::Settings;

    fn user_from(declaration: &str) -> UserConfiguration {
        let settings = Settings::parse(crate::settings::EXAMPLE_SETTINGS_YAML).unwrap();
        let declaration = PipelineDeclaration::parse(declaration).unwrap();
        UserConfiguration::from_declaration(&declaration, &settings).unwrap()
    }

    const DECLARATION: &str = r#"
user_name: jdoe
email: jdoe@example.org
repositories:
  - name: cob_common
    fork: ipa320
    branch: indigo_dev
    ros_distro: { indigo: "true" }
    prio_ubuntu_distro: trusty
    prio_arch: amd64
    regular_build:
      nongraphicsTest: "true"
      trusty__amd64__env: "true"
    dependencies:
      - name: cob_driver
"#;

    #[test]
    fn test_render_end_to_end_scenario() {
        let document = render(&user_from(DECLARATION));
        assert_eq!(document.user_name, "jdoe");
        assert_eq!(document.server_name, "build.example.org");
        assert!(document.committer_email_enabled);

        let root = document.repositories.get("cob_common").unwrap();
        assert_eq!(root.url, "git@github.com:ipa320/cob_common.git");
        assert_eq!(root.version, "indigo_dev");
        assert!(root.poll);
        assert_eq!(root.jobs, ["regular_build", "nongraphics_test"]);
        assert_eq!(root.matrix_distro_arch.get("trusty").unwrap(), &["amd64"]);

        // empty fork and branch fell back to the configured defaults
        let dep = root.dependencies.get("cob_driver").unwrap();
        assert_eq!(dep.url, "git@github.com:ipa320/cob_driver.git");
        assert_eq!(dep.version, "master");
        assert_eq!(dep.r#type, "git");
        assert!(dep.poll);
    }

    #[test]
    fn test_yaml_round_trip() {
        let document = render(&user_from(DECLARATION));
        let yaml = document.to_yaml().unwrap();
        let reparsed = PipelineDocument::parse(&yaml).unwrap();
        assert_eq!(reparsed, document);
    }

    #[test]
    fn test_repositories_keyed_by_full_name() {
        let declaration = r#"
user_name: jdoe
repositories:
  - name: cob_common
  - name: cob_common
    suffix: hydro
    branch: hydro_dev
"#;
        let document = render(&user_from(declaration));
        assert_eq!(document.repositories.len(), 2);
        assert!(document.repositories.contains_key("cob_common"));
        let variant = document.repositories.get("cob_common__hydro").unwrap();
        assert_eq!(variant.version, "hydro_dev");
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = render(&user_from(DECLARATION)).to_yaml().unwrap();
        let b = render(&user_from(DECLARATION)).to_yaml().unwrap();
        assert_eq!(a, b);
    }
}
