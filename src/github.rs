//! # GitHub REST Client
//!
//! [`PlatformClient`] implementation over the GitHub REST v3 API, using a
//! blocking `reqwest` client authenticated with the globally configured
//! login and password. Only the handful of listing endpoints the resolver
//! needs are covered; this is deliberately not a general GitHub client.

use crate::error::{Error, Result};
use crate::resolver::{PlatformClient, RemoteAccount, RemoteRepository, RemoteTeam};
use crate::settings::Settings;
use serde::de::DeserializeOwned;
use serde::Deserialize;

const DEFAULT_API_ROOT: &str = "https://api.github.com";

/// Listing endpoints return at most this many entries per page; one page is
/// requested.
const PAGE_SIZE: u32 = 100;

pub struct GithubClient {
    http: reqwest::blocking::Client,
    api_root: String,
    login: String,
    password: String,
}

impl GithubClient {
    pub fn new(settings: &Settings) -> Self {
        Self::with_api_root(settings, DEFAULT_API_ROOT)
    }

    /// Point the client at a different API root (test servers, GitHub
    /// Enterprise installs).
    pub fn with_api_root(settings: &Settings, api_root: &str) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            api_root: api_root.trim_end_matches('/').to_string(),
            login: settings.github_login.clone(),
            password: settings.github_password.clone(),
        }
    }

    fn get<T: DeserializeOwned>(&self, resource: &str) -> Result<T> {
        let url = format!("{}/{}", self.api_root, resource);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.login, Some(&self.password))
            .header(reqwest::header::USER_AGENT, "pipeline-config")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Platform {
                resource: resource.to_string(),
                message: status.to_string(),
            });
        }
        Ok(response.json()?)
    }
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    name: String,
    owner: OwnerPayload,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    fork: bool,
    /// Only present on single-repository responses.
    #[serde(default)]
    parent: Option<Box<RepositoryPayload>>,
}

impl From<RepositoryPayload> for RemoteRepository {
    fn from(payload: RepositoryPayload) -> Self {
        RemoteRepository {
            name: payload.name,
            owner: payload.owner.login,
            private: payload.private,
            fork: payload.fork,
            parent: payload.parent.map(|p| (p.owner.login, p.name)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountPayload {
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    public_repos: u64,
    #[serde(default)]
    total_private_repos: u64,
}

impl From<AccountPayload> for RemoteAccount {
    fn from(payload: AccountPayload) -> Self {
        RemoteAccount {
            login: payload.login,
            name: payload.name,
            public_repos: payload.public_repos,
            private_repos: payload.total_private_repos,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BranchPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TeamPayload {
    id: u64,
    name: String,
    #[serde(default)]
    repos_count: u64,
}

impl PlatformClient for GithubClient {
    fn repositories(&self, owner: &str) -> Result<Vec<RemoteRepository>> {
        let payload: Vec<RepositoryPayload> =
            self.get(&format!("users/{}/repos?per_page={}", owner, PAGE_SIZE))?;
        Ok(payload.into_iter().map(Into::into).collect())
    }

    fn repository(&self, owner: &str, name: &str) -> Result<RemoteRepository> {
        let payload: RepositoryPayload = self.get(&format!("repos/{}/{}", owner, name))?;
        Ok(payload.into())
    }

    fn forks(&self, owner: &str, name: &str) -> Result<Vec<RemoteRepository>> {
        let payload: Vec<RepositoryPayload> = self.get(&format!(
            "repos/{}/{}/forks?per_page={}",
            owner, name, PAGE_SIZE
        ))?;
        Ok(payload.into_iter().map(Into::into).collect())
    }

    fn branches(&self, owner: &str, name: &str) -> Result<Vec<String>> {
        let payload: Vec<BranchPayload> = self.get(&format!(
            "repos/{}/{}/branches?per_page={}",
            owner, name, PAGE_SIZE
        ))?;
        Ok(payload.into_iter().map(|b| b.name).collect())
    }

    fn user(&self, login: &str) -> Result<RemoteAccount> {
        let payload: AccountPayload = self.get(&format!("users/{}", login))?;
        Ok(payload.into())
    }

    fn organization(&self, login: &str) -> Result<RemoteAccount> {
        let payload: AccountPayload = self.get(&format!("orgs/{}", login))?;
        Ok(payload.into())
    }

    fn teams(&self, org: &str) -> Result<Vec<RemoteTeam>> {
        let payload: Vec<TeamPayload> = self.get(&format!("orgs/{}/teams", org))?;
        Ok(payload
            .into_iter()
            .map(|t| RemoteTeam {
                id: t.id,
                name: t.name,
                repos_count: t.repos_count,
            })
            .collect())
    }

    fn team_repositories(&self, team_id: u64) -> Result<Vec<RemoteRepository>> {
        let payload: Vec<RepositoryPayload> =
            self.get(&format!("teams/{}/repos?per_page={}", team_id, PAGE_SIZE))?;
        Ok(payload.into_iter().map(Into::into).collect())
    }
}
