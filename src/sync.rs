//! # Shared Repository Synchronization
//!
//! Persists the rendered configuration document and publishes it into the
//! shared configuration repository. The pipeline is a fixed sequence of
//! stages executed strictly in order:
//!
//! 1. **Write** the document to the per-user path (fatal on failure -
//!    without a local document there is nothing to synchronize).
//! 2. **Obtain** the shared repository: clone it if the working copy is
//!    missing, pull otherwise.
//! 3. **Place** the document at `{server_name}/{user_id}/pipeline_config.yaml`
//!    inside the working copy.
//! 4. **Add** that exact relative path to the index.
//! 5. **Commit** with a message naming the user.
//! 6. **Push** to the remote.
//!
//! Failures in stages 2-6 are logged and recorded but do not abort later
//! stages; no stage is retried and nothing is rolled back. A failed push
//! leaves a valid local commit behind, which the next save publishes - the
//! design accepts eventual consistency.
//!
//! ## Design
//!
//! Git work goes through the [`GitOperations`] trait so tests can run the
//! pipeline against a mock; [`DefaultGitOperations`] wraps the system `git`
//! command, which transparently picks up SSH keys and credential helpers.
//!
//! The working copy is one mutable resource shared by every save on this
//! host, so the clone-through-push sequence is serialized by a process-wide
//! lock keyed by the working copy path.

use crate::error::{Error, Result};
use crate::settings::Settings;
use log::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, OnceLock};

/// File name of the per-user document, both locally and in the shared
/// repository.
pub const CONFIG_FILE_NAME: &str = "pipeline_config.yaml";

/// Git actions the pipeline needs - allows mocking in tests.
pub trait GitOperations: Send + Sync {
    /// Clone `url` into `target_dir`, creating parent directories.
    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()>;

    /// Pull the current branch of an existing working copy.
    fn pull(&self, work_dir: &Path) -> Result<()>;

    /// Stage one path, relative to the working copy root.
    fn add(&self, work_dir: &Path, relative_path: &str) -> Result<()>;

    /// Commit the index with the given message.
    fn commit(&self, work_dir: &Path, message: &str) -> Result<()>;

    /// Push the current branch to its remote.
    fn push(&self, work_dir: &Path) -> Result<()>;
}

/// The default implementation, which uses the system `git` command.
pub struct DefaultGitOperations;

fn run_git(work_dir: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .current_dir(work_dir)
        .args(args)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            dir: work_dir.display().to_string(),
            stderr: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            dir: work_dir.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(())
}

impl GitOperations for DefaultGitOperations {
    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()> {
        if let Some(parent) = target_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        let output = Command::new("git")
            .arg("clone")
            .arg(url)
            .arg(target_dir)
            .output()
            .map_err(|e| Error::GitClone {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(Error::GitClone {
                url: url.to_string(),
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }

    fn pull(&self, work_dir: &Path) -> Result<()> {
        run_git(work_dir, &["pull"])
    }

    fn add(&self, work_dir: &Path, relative_path: &str) -> Result<()> {
        run_git(work_dir, &["add", relative_path])
    }

    fn commit(&self, work_dir: &Path, message: &str) -> Result<()> {
        run_git(work_dir, &["commit", "-m", message])
    }

    fn push(&self, work_dir: &Path) -> Result<()> {
        run_git(work_dir, &["push"])
    }
}

/// The stages of one synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    WriteLocal,
    ObtainSharedRepo,
    Place,
    Add,
    Commit,
    Push,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::WriteLocal => "write local document",
            Stage::ObtainSharedRepo => "obtain shared repository",
            Stage::Place => "place document",
            Stage::Add => "stage document",
            Stage::Commit => "commit",
            Stage::Push => "push",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one stage.
#[derive(Debug)]
pub struct StageOutcome {
    pub stage: Stage,
    pub ok: bool,
    pub detail: Option<String>,
}

/// Per-stage outcomes of one synchronization run, in execution order.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<StageOutcome>,
}

impl SyncReport {
    fn succeeded(&mut self, stage: Stage) {
        info!("{}: ok", stage);
        self.outcomes.push(StageOutcome {
            stage,
            ok: true,
            detail: None,
        });
    }

    fn failed(&mut self, stage: Stage, err: &Error) {
        warn!("{} failed: {}", stage, err);
        self.outcomes.push(StageOutcome {
            stage,
            ok: false,
            detail: Some(err.to_string()),
        });
    }

    /// True when every executed stage succeeded.
    pub fn fully_synchronized(&self) -> bool {
        self.outcomes.iter().all(|o| o.ok)
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.stage == stage)
    }
}

/// Process-wide lock per shared-repository working copy. Concurrent saves
/// on one host would otherwise race on clone/pull/commit/push.
fn repo_lock(work_dir: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let locks = LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    map.entry(work_dir.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Publishes per-user configuration documents into the shared repository.
pub struct SyncPipeline<'a> {
    settings: &'a Settings,
    git: Box<dyn GitOperations>,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self::with_git(settings, Box::new(DefaultGitOperations))
    }

    pub fn with_git(settings: &'a Settings, git: Box<dyn GitOperations>) -> Self {
        Self { settings, git }
    }

    /// Local path of the user's own document.
    pub fn local_config_path(&self, user_id: &str) -> PathBuf {
        self.settings
            .workdir
            .join("users")
            .join(user_id)
            .join(CONFIG_FILE_NAME)
    }

    /// Local working copy of the shared configuration repository.
    pub fn shared_repo_dir(&self) -> PathBuf {
        self.settings.workdir.join("pipeline").join("config_repo")
    }

    /// Run the full synchronization for one user's rendered document.
    pub fn synchronize(&self, document_yaml: &str, user_id: &str) -> Result<SyncReport> {
        let server_name = self.settings.server_name()?;
        let mut report = SyncReport::default();

        // Stage 1: nothing to synchronize if the local write fails.
        let local_path = self.local_config_path(user_id);
        if let Err(err) = write_document(&local_path, document_yaml) {
            report.failed(Stage::WriteLocal, &err);
            return Err(err);
        }
        info!("wrote {}", local_path.display());
        report.succeeded(Stage::WriteLocal);

        let shared_dir = self.shared_repo_dir();
        let lock = repo_lock(&shared_dir);
        let _guard = lock.lock().map_err(|_| Error::LockPoisoned {
            context: shared_dir.display().to_string(),
        })?;

        // Stage 2
        let obtain = if shared_dir.join(".git").is_dir() {
            self.git.pull(&shared_dir)
        } else {
            self.git
                .clone_repo(&self.settings.config_repo_url, &shared_dir)
        };
        match obtain {
            Ok(()) => report.succeeded(Stage::ObtainSharedRepo),
            Err(err) => report.failed(Stage::ObtainSharedRepo, &err),
        }

        // Stage 3
        let relative_path = format!("{}/{}/{}", server_name, user_id, CONFIG_FILE_NAME);
        let target_path = shared_dir.join(&relative_path);
        match write_document(&target_path, document_yaml) {
            Ok(()) => report.succeeded(Stage::Place),
            Err(err) => report.failed(Stage::Place, &err),
        }

        // Stage 4
        match self.git.add(&shared_dir, &relative_path) {
            Ok(()) => report.succeeded(Stage::Add),
            Err(err) => report.failed(Stage::Add, &err),
        }

        // Stage 5
        let message = format!("Updated pipeline for {}", user_id);
        match self.git.commit(&shared_dir, &message) {
            Ok(()) => report.succeeded(Stage::Commit),
            Err(err) => report.failed(Stage::Commit, &err),
        }

        // Stage 6
        match self.git.push(&shared_dir) {
            Ok(()) => report.succeeded(Stage::Push),
            Err(err) => report.failed(Stage::Push, &err),
        }

        Ok(report)
    }
}

fn write_document(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn settings_in(workdir: &Path) -> Settings {
        let mut settings = Settings::parse(crate::settings::EXAMPLE_SETTINGS_YAML).unwrap();
        settings.workdir = workdir.to_path_buf();
        settings
    }

    /// Mock recording every git call; individual operations can be scripted
    /// to fail.
    #[derive(Default)]
    struct MockGit {
        calls: Mutex<Vec<String>>,
        fail_obtain: bool,
        fail_push: bool,
    }

    impl MockGit {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl GitOperations for MockGit {
        fn clone_repo(&self, url: &str, _target_dir: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(format!("clone {}", url));
            if self.fail_obtain {
                Err(Error::GitClone {
                    url: url.to_string(),
                    message: "network unreachable".to_string(),
                })
            } else {
                Ok(())
            }
        }

        fn pull(&self, _work_dir: &Path) -> Result<()> {
            self.calls.lock().unwrap().push("pull".to_string());
            if self.fail_obtain {
                Err(Error::GitCommand {
                    command: "pull".to_string(),
                    dir: String::new(),
                    stderr: "network unreachable".to_string(),
                })
            } else {
                Ok(())
            }
        }

        fn add(&self, _work_dir: &Path, relative_path: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("add {}", relative_path));
            Ok(())
        }

        fn commit(&self, _work_dir: &Path, message: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("commit {}", message));
            Ok(())
        }

        fn push(&self, _work_dir: &Path) -> Result<()> {
            self.calls.lock().unwrap().push("push".to_string());
            if self.fail_push {
                Err(Error::GitCommand {
                    command: "push".to_string(),
                    dir: String::new(),
                    stderr: "rejected".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn pipeline_with<'a>(settings: &'a Settings, git: MockGit) -> (SyncPipeline<'a>, Arc<MockGit>) {
        let git = Arc::new(git);
        let shared = git.clone();
        struct Forward(Arc<MockGit>);
        impl GitOperations for Forward {
            fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()> {
                self.0.clone_repo(url, target_dir)
            }
            fn pull(&self, work_dir: &Path) -> Result<()> {
                self.0.pull(work_dir)
            }
            fn add(&self, work_dir: &Path, relative_path: &str) -> Result<()> {
                self.0.add(work_dir, relative_path)
            }
            fn commit(&self, work_dir: &Path, message: &str) -> Result<()> {
                self.0.commit(work_dir, message)
            }
            fn push(&self, work_dir: &Path) -> Result<()> {
                self.0.push(work_dir)
            }
        }
        (
            SyncPipeline::with_git(settings, Box::new(Forward(git))),
            shared,
        )
    }

    #[test]
    fn test_happy_path_runs_all_stages_in_order() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(tmp.path());
        let (pipeline, git) = pipeline_with(&settings, MockGit::default());

        let report = pipeline.synchronize("user_name: jdoe\n", "jdoe").unwrap();
        assert!(report.fully_synchronized());

        let calls = git.calls();
        assert_eq!(
            calls,
            vec![
                "clone git@github.com:ipa320/jenkins_config.git",
                "add build.example.org/jdoe/pipeline_config.yaml",
                "commit Updated pipeline for jdoe",
                "push",
            ]
        );

        // document written both locally and inside the working copy
        let local = tmp.path().join("users/jdoe/pipeline_config.yaml");
        assert_eq!(fs::read_to_string(local).unwrap(), "user_name: jdoe\n");
        let placed = tmp
            .path()
            .join("pipeline/config_repo/build.example.org/jdoe/pipeline_config.yaml");
        assert_eq!(fs::read_to_string(placed).unwrap(), "user_name: jdoe\n");
    }

    #[test]
    fn test_existing_working_copy_is_pulled_not_cloned() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(tmp.path());
        fs::create_dir_all(tmp.path().join("pipeline/config_repo/.git")).unwrap();
        let (pipeline, git) = pipeline_with(&settings, MockGit::default());

        pipeline.synchronize("x: 1\n", "jdoe").unwrap();
        assert_eq!(git.calls()[0], "pull");
    }

    #[test]
    fn test_local_write_failure_aborts_pipeline() {
        let tmp = TempDir::new().unwrap();
        // make the users path unusable by occupying it with a file
        fs::write(tmp.path().join("users"), b"not a directory").unwrap();
        let settings = settings_in(tmp.path());
        let (pipeline, git) = pipeline_with(&settings, MockGit::default());

        let err = pipeline.synchronize("x: 1\n", "jdoe").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(git.calls().is_empty());
    }

    #[test]
    fn test_obtain_failure_does_not_abort_later_stages() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(tmp.path());
        let (pipeline, git) = pipeline_with(
            &settings,
            MockGit {
                fail_obtain: true,
                ..Default::default()
            },
        );

        let report = pipeline.synchronize("x: 1\n", "jdoe").unwrap();
        assert!(!report.fully_synchronized());
        assert!(!report.outcome(Stage::ObtainSharedRepo).unwrap().ok);
        // placement, add, commit and push still ran
        assert!(report.outcome(Stage::Place).unwrap().ok);
        let calls = git.calls();
        assert!(calls.iter().any(|c| c.starts_with("add ")));
        assert!(calls.iter().any(|c| c == "push"));
    }

    #[test]
    fn test_push_failure_is_recorded_but_save_succeeds() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(tmp.path());
        let (pipeline, _git) = pipeline_with(
            &settings,
            MockGit {
                fail_push: true,
                ..Default::default()
            },
        );

        let report = pipeline.synchronize("x: 1\n", "jdoe").unwrap();
        let push = report.outcome(Stage::Push).unwrap();
        assert!(!push.ok);
        assert!(push.detail.as_deref().unwrap().contains("rejected"));
        assert!(report.outcome(Stage::Commit).unwrap().ok);
    }
}
