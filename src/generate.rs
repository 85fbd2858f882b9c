//! # Generation Trigger
//!
//! Invokes the external pipeline generator once the user's persisted
//! configuration document is durably on disk. The document may be written
//! asynchronously by the host, so the trigger first polls the record's
//! modification time until it falls inside a freshness window, then spawns
//! the generator and interprets its output.
//!
//! Time and file metadata go through the [`Clock`] and [`FileStat`] traits,
//! which lets tests drive the wait loop without real sleeping.

use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::sync::CONFIG_FILE_NAME;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, SystemTime};

/// Delay between modification-time polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Overall ceiling on the freshness wait.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// A record counts as fresh when its age is positive and at most this.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(15);

/// Source of time, mockable in tests.
pub trait Clock {
    fn now(&self) -> SystemTime;
    fn sleep(&self, duration: Duration);
}

/// Wall clock with real sleeping.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// File metadata access, mockable in tests.
pub trait FileStat {
    fn modified(&self, path: &Path) -> Result<SystemTime>;
}

/// Real filesystem metadata.
pub struct DiskStat;

impl FileStat for DiskStat {
    fn modified(&self, path: &Path) -> Result<SystemTime> {
        Ok(fs::metadata(path)?.modified()?)
    }
}

/// Bounded poll loop waiting for a record file to settle on disk.
///
/// A poll succeeds when `0 < now - mtime <= window`: a non-positive age
/// means the file is still being written or the clocks are skewed, an age
/// beyond the window means the record predates the save being waited on.
pub struct FreshnessWait<'a> {
    clock: &'a dyn Clock,
    stat: &'a dyn FileStat,
    interval: Duration,
    timeout: Duration,
    window: Duration,
}

impl<'a> FreshnessWait<'a> {
    pub fn new(clock: &'a dyn Clock, stat: &'a dyn FileStat) -> Self {
        Self::with_limits(clock, stat, POLL_INTERVAL, WAIT_TIMEOUT, FRESHNESS_WINDOW)
    }

    pub fn with_limits(
        clock: &'a dyn Clock,
        stat: &'a dyn FileStat,
        interval: Duration,
        timeout: Duration,
        window: Duration,
    ) -> Self {
        Self {
            clock,
            stat,
            interval,
            timeout,
            window,
        }
    }

    /// Block until `path` is fresh or the timeout elapses.
    pub fn wait(&self, path: &Path) -> Result<()> {
        let started = self.clock.now();
        loop {
            if let Ok(modified) = self.stat.modified(path) {
                // Err means a modification time in the future: not settled.
                if let Ok(age) = self.clock.now().duration_since(modified) {
                    if !age.is_zero() && age <= self.window {
                        info!("record {} is fresh (age {:?})", path.display(), age);
                        return Ok(());
                    }
                }
            }
            let waited = self
                .clock
                .now()
                .duration_since(started)
                .unwrap_or_default();
            if waited >= self.timeout {
                return Err(Error::FreshnessTimeout {
                    path: path.display().to_string(),
                    waited_secs: waited.as_secs(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            self.clock.sleep(self.interval);
        }
    }
}

/// Final verdict of one generator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// What the generator reported, rendered for display.
#[derive(Debug, Clone)]
pub struct GenerationStatus {
    pub message: String,
    pub status: Outcome,
    pub detail: String,
}

impl GenerationStatus {
    pub fn is_success(&self) -> bool {
        self.status == Outcome::Success
    }
}

/// Classify a finished generator run from its captured streams. Anything on
/// the error stream means failure, regardless of exit code; otherwise the
/// output stream is the informational success message.
pub fn interpret(stdout: &str, stderr: &str) -> GenerationStatus {
    let errors: Vec<&str> = stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if !errors.is_empty() {
        let detail = errors.join("\n");
        GenerationStatus {
            message: format!("pipeline generation failed: {}", detail),
            status: Outcome::Failure,
            detail,
        }
    } else {
        let detail = stdout.trim().to_string();
        let message = if detail.is_empty() {
            "pipeline generation finished".to_string()
        } else {
            format!("pipeline generation finished: {}", detail)
        };
        GenerationStatus {
            message,
            status: Outcome::Success,
            detail,
        }
    }
}

/// Runs the external generator for one user.
pub struct GenerationTrigger<'a> {
    settings: &'a Settings,
}

impl<'a> GenerationTrigger<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// The persisted record whose freshness gates the invocation.
    pub fn record_path(&self, user_id: &str) -> PathBuf {
        self.settings
            .workdir
            .join("users")
            .join(user_id)
            .join(CONFIG_FILE_NAME)
    }

    /// Wait for the user's record to settle, then invoke the generator.
    pub fn trigger(&self, user_id: &str, wait: &FreshnessWait) -> Result<GenerationStatus> {
        wait.wait(&self.record_path(user_id))?;
        self.invoke(user_id)
    }

    /// Spawn the generator and block until it exits.
    pub fn invoke(&self, user_id: &str) -> Result<GenerationStatus> {
        info!(
            "invoking generator {} for {}",
            self.settings.generator_path.display(),
            user_id
        );
        let output = Command::new(&self.settings.generator_path)
            .arg("-m")
            .arg(&self.settings.root_url)
            .arg("-l")
            .arg(&self.settings.github_login)
            .arg("-p")
            .arg(&self.settings.github_password)
            .arg("-o")
            .arg(&self.settings.default_fork)
            .arg("-t")
            .arg(&self.settings.tarball_location)
            .arg("-u")
            .arg(user_id)
            .output()
            .map_err(|e| Error::Generator {
                message: format!(
                    "could not spawn {}: {}",
                    self.settings.generator_path.display(),
                    e
                ),
            })?;
        let status = interpret(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        );
        if !status.is_success() {
            warn!("generator reported failure for {}", user_id);
        }
        Ok(status)
    }
}
