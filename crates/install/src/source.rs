//! Source checkout management.
//!
//! Clones the upstream repository on first use and optionally refreshes it
//! afterwards. Refresh failures are downgraded to warnings: a stale checkout
//! is still buildable.

use crate::process::{CommandRunner, Invocation};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Upstream source repository.
pub const DEFAULT_REMOTE: &str = "https://github.com/extism/extism";

/// Default branch to clone and track.
pub const DEFAULT_BRANCH: &str = "main";

/// What [`SourceRepository::sync`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A fresh clone was made.
    Cloned,
    /// The existing checkout was left alone.
    Unchanged,
    /// The existing checkout was refreshed; failed steps are listed.
    Refreshed {
        /// One message per failed refresh step.
        warnings: Vec<String>,
    },
}

impl SyncOutcome {
    /// Warnings produced by the sync, if any.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Refreshed { warnings } => warnings,
            Self::Cloned | Self::Unchanged => &[],
        }
    }
}

/// A git checkout of the library sources.
pub struct SourceRepository {
    path: PathBuf,
    remote: String,
    runner: Arc<dyn CommandRunner>,
}

impl SourceRepository {
    /// Create a handle for the checkout at `path`, cloned from `remote`.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        remote: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            path: path.into(),
            remote: remote.into(),
            runner,
        }
    }

    /// Checkout location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a checkout already exists.
    #[must_use]
    pub fn is_checked_out(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Make sure a checkout of `branch` exists, refreshing it when asked.
    ///
    /// # Errors
    ///
    /// Returns an error only when a fresh clone fails. Refresh failures are
    /// reported through [`SyncOutcome::Refreshed`].
    pub fn sync(&self, branch: &str, refresh: bool) -> Result<SyncOutcome> {
        if self.is_checked_out() {
            if !refresh {
                info!(path = ?self.path, "Using existing checkout");
                return Ok(SyncOutcome::Unchanged);
            }
            return Ok(SyncOutcome::Refreshed {
                warnings: self.refresh(branch),
            });
        }

        self.clone_branch(branch)?;
        Ok(SyncOutcome::Cloned)
    }

    fn refresh(&self, branch: &str) -> Vec<String> {
        info!(path = ?self.path, %branch, "Updating checkout");

        let steps = [
            Invocation::new("git").args(["fetch", "origin"]),
            Invocation::new("git").args(["checkout", branch]),
            Invocation::new("git").args(["pull", "origin", branch]),
        ];

        let mut warnings = Vec::new();
        for step in steps {
            let step = step.current_dir(&self.path);
            let failure = match self.runner.run(&step) {
                Ok(status) if status.success() => continue,
                Ok(status) => format!("`{step}` exited with {:?}", status.code),
                Err(e) => format!("`{step}` could not run: {e}"),
            };
            warn!(path = ?self.path, "{failure}");
            warnings.push(failure);
        }
        warnings
    }

    fn clone_branch(&self, branch: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(remote = %self.remote, path = ?self.path, %branch, "Cloning source");

        let clone = Invocation::new("git")
            .args(["clone", "--depth", "1", "--branch", branch])
            .arg(self.remote.as_str())
            .path_arg(&self.path);

        let status = self.runner.run(&clone)?;
        if !status.success() {
            return Err(Error::SourceCheckout {
                remote: self.remote.clone(),
                path: self.path.clone(),
                message: format!("git exited with {:?}", status.code),
            });
        }
        Ok(())
    }
}
