//! Process-level installer settings.

use crate::paths;
use crate::release::DEFAULT_FEED_URL;
use crate::source::DEFAULT_REMOTE;
use crate::Result;
use std::path::{Path, PathBuf};

/// Environment variables consulted for the feed token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Where state lives and which remotes are used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerSettings {
    /// Base state directory (config, cache, extractions, default checkout).
    pub state_dir: PathBuf,
    /// Release feed URL.
    pub feed_url: String,
    /// Source repository remote.
    pub remote_url: String,
    /// Feed access token.
    pub token: Option<String>,
}

impl InstallerSettings {
    /// Creates settings rooted at `state_dir` with the upstream remotes.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            remote_url: DEFAULT_REMOTE.to_string(),
            token: None,
        }
    }

    /// Build settings from `EXTISM_PATH` and the token variables.
    ///
    /// # Errors
    ///
    /// Returns an error if no state directory can be determined.
    pub fn from_env() -> Result<Self> {
        let token = TOKEN_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty());

        Ok(Self::new(paths::state_dir()?).with_token(token))
    }

    /// Sets the feed token, keeping the current one when `None`.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        if token.is_some() {
            self.token = token;
        }
        self
    }

    /// Sets the release feed URL.
    #[must_use]
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    /// Sets the source remote.
    #[must_use]
    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = url.into();
        self
    }

    /// Persisted config record.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        paths::config_file(&self.state_dir)
    }

    /// Archive cache root.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        paths::cache_dir(&self.state_dir)
    }

    /// Extraction directory for release `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidTag`] if `tag` would leave the release
    /// directory.
    pub fn extract_dir(&self, tag: &str) -> Result<PathBuf> {
        Ok(paths::release_dir(&self.state_dir).join(paths::tag_component(tag)?))
    }

    /// Checkout location used when none is configured.
    #[must_use]
    pub fn default_source_path(&self) -> PathBuf {
        paths::default_source_path(&self.state_dir)
    }

    /// Base state directory.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }
}
