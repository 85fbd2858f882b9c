//! # Error Handling
//!
//! Centralized error handling for `pipeline-config`, built on `thiserror`.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum covering every anticipated failure mode:
//!   declaration/settings parsing, Git command execution, remote platform
//!   queries, local persistence, the freshness wait, and generator
//!   invocation. Each variant carries the context needed for a precise
//!   user-facing message.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`, used
//!   throughout the library to simplify function signatures.
//!
//! Remote-platform failures deserve a note: the resolver catches them at its
//! boundary and converts them into validation verdicts, so `Error::Platform`
//! only ever reaches callers of the lower-level client operations.

use thiserror::Error;

/// Main error type for pipeline-config operations
#[derive(Error, Debug)]
pub enum Error {
    /// A settings file or pipeline declaration could not be interpreted.
    ///
    /// Includes the specific issue and optionally a hint about how to fix it.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Configuration {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// An error occurred while cloning the shared configuration repository.
    #[error("Git clone error for {url}: {message}")]
    GitClone { url: String, message: String },

    /// An error occurred while executing a Git command in a working copy.
    #[error("Git command failed: git {command} in {dir} - {stderr}")]
    GitCommand {
        command: String,
        dir: String,
        stderr: String,
    },

    /// A query against the hosted Git platform failed.
    #[error("Platform query failed for {resource}: {message}")]
    Platform { resource: String, message: String },

    /// The host's persisted user record did not settle within the wait ceiling.
    #[error("Timed out after {waited_secs}s waiting for {path} to become fresh (limit {timeout_secs}s)")]
    FreshnessTimeout {
        path: String,
        waited_secs: u64,
        timeout_secs: u64,
    },

    /// The external generator process could not be spawned.
    #[error("Generator invocation error: {message}")]
    Generator { message: String },

    /// A mutex guarding the shared repository working copy has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON handling error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// An HTTP transport error, wrapped from `reqwest::Error`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Shorthand for a configuration error without a hint.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            hint: None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_configuration() {
        let error = Error::config("unsupported vcs type 'svn'");
        let display = format!("{}", error);
        assert!(display.contains("Configuration error"));
        assert!(display.contains("unsupported vcs type 'svn'"));
    }

    #[test]
    fn test_error_display_configuration_with_hint() {
        let error = Error::Configuration {
            message: "missing repository name".to_string(),
            hint: Some("add 'name:' to the repository block".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("missing repository name"));
        assert!(display.contains("hint:"));
        assert!(display.contains("add 'name:'"));
    }

    #[test]
    fn test_error_display_git_clone() {
        let error = Error::GitClone {
            url: "git@github.com:fmw/jenkins-config.git".to_string(),
            message: "Authentication failed".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Git clone error"));
        assert!(display.contains("git@github.com:fmw/jenkins-config.git"));
        assert!(display.contains("Authentication failed"));
    }

    #[test]
    fn test_error_display_git_command() {
        let error = Error::GitCommand {
            command: "push".to_string(),
            dir: "/var/lib/ci/pipeline/config_repo".to_string(),
            stderr: "Permission denied".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Git command failed"));
        assert!(display.contains("push"));
        assert!(display.contains("Permission denied"));
    }

    #[test]
    fn test_error_display_platform() {
        let error = Error::Platform {
            resource: "repos/ipa320/cob_common".to_string(),
            message: "404 Not Found".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Platform query failed"));
        assert!(display.contains("repos/ipa320/cob_common"));
    }

    #[test]
    fn test_error_display_freshness_timeout() {
        let error = Error::FreshnessTimeout {
            path: "/var/lib/ci/users/jdoe/config.xml".to_string(),
            waited_secs: 31,
            timeout_secs: 30,
        };
        let display = format!("{}", error);
        assert!(display.contains("Timed out"));
        assert!(display.contains("31"));
        assert!(display.contains("30"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_str = "invalid: [unclosed";
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let error: Error = yaml_error.into();
        let display = format!("{}", error);
        assert!(display.contains("YAML parsing error"));
    }
}
