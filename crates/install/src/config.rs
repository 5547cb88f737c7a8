//! Persisted installation state.
//!
//! A single JSON record remembers where the source checkout lives, which
//! prefix was installed into, and which version ended up there. Later
//! invocations use it as defaults for anything not given explicitly.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Install prefix used when neither an explicit nor a stored one exists.
pub const DEFAULT_INSTALL_PREFIX: &str = "/usr/local";

/// The last-known installation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Source checkout location.
    pub source_path: PathBuf,
    /// Root receiving `lib/` and `include/`.
    pub install_prefix: PathBuf,
    /// Installed release tag, or `git` for source installs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Values supplied explicitly for the current invocation.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit source checkout location.
    pub source_path: Option<PathBuf>,
    /// Explicit install prefix.
    pub install_prefix: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Sets the install prefix.
    #[must_use]
    pub fn with_install_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.install_prefix = Some(prefix.into());
        self
    }

    /// Sets the source checkout location.
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// Merge stored state with explicit overrides.
///
/// Each field resolves to the explicit value, else the stored value, else the
/// default. `version` is never overridden here; it only changes when an
/// install is persisted.
#[must_use]
pub fn merge(
    stored: Option<InstallConfig>,
    overrides: &ConfigOverrides,
    default_source_path: &Path,
) -> InstallConfig {
    let (stored_source, stored_prefix, version) = match stored {
        Some(config) => (
            Some(config.source_path),
            Some(config.install_prefix),
            config.version,
        ),
        None => (None, None, None),
    };

    InstallConfig {
        source_path: overrides
            .source_path
            .clone()
            .or(stored_source)
            .unwrap_or_else(|| default_source_path.to_path_buf()),
        install_prefix: overrides
            .install_prefix
            .clone()
            .or(stored_prefix)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INSTALL_PREFIX)),
        version,
    }
}

/// Reads and writes the [`InstallConfig`] record.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store backed by the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored config. A missing file means no prior state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<InstallConfig>> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No stored install config");
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::config(&self.path, format!("failed to read: {e}")))?;
        let config = serde_json::from_str(&content)
            .map_err(|e| Error::config(&self.path, format!("failed to parse: {e}")))?;

        Ok(Some(config))
    }

    /// Replace the stored config with `config`.
    ///
    /// This is a full overwrite; merge in memory first.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self, config: &InstallConfig) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(config)?;

        // Write to a sibling temp file, then rename over the old record
        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        file.write_all(json.as_bytes())?;
        file.flush()?;
        file.persist(&self.path)
            .map_err(|e| Error::config(&self.path, format!("failed to write: {e}")))?;

        debug!(path = ?self.path, ?config, "Saved install config");
        Ok(())
    }
}
