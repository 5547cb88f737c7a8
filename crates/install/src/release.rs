//! Release catalog.
//!
//! Lists published releases from the remote feed (GitHub Releases) and
//! resolves version selectors (`latest`, a tag, or `git`) against it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use tracing::{debug, info};

/// Release feed of the upstream repository.
pub const DEFAULT_FEED_URL: &str = "https://api.github.com/repos/extism/extism/releases";

/// User agent sent with feed and download requests.
const USER_AGENT: &str = concat!("extism-cli/", env!("CARGO_PKG_VERSION"));

/// One downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// File name.
    pub name: String,
    /// Direct download URL.
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

impl Asset {
    /// Plain-text sidecar files (checksums, notes) are never install candidates.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.name.contains(".txt")
    }
}

/// A published release, projected down to the fields the installer uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Release tag; unique within a feed.
    #[serde(rename = "tag_name")]
    pub tag: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Attached files, in feed order.
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// Source archive URL.
    #[serde(default)]
    pub tarball_url: Option<String>,
}

/// Which release to use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSelector {
    /// The newest release in the feed.
    Latest,
    /// An exact release tag.
    Tag(String),
    /// No release: build from a source checkout.
    Git,
}

impl VersionSelector {
    /// Whether this selector builds from source.
    #[must_use]
    pub const fn is_git(&self) -> bool {
        matches!(self, Self::Git)
    }
}

impl FromStr for VersionSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "latest" => Self::Latest,
            "git" => Self::Git,
            tag => Self::Tag(tag.to_string()),
        })
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Tag(tag) => write!(f, "{tag}"),
            Self::Git => write!(f, "git"),
        }
    }
}

/// Outcome of resolving a [`VersionSelector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A concrete published release.
    Release(Release),
    /// Build from source.
    Git,
}

/// Remote source of releases and their assets.
pub trait ReleaseFeed: Send + Sync {
    /// List releases, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the feed cannot be read.
    fn list_releases(&self, token: Option<&str>) -> Result<Vec<Release>>;

    /// Stream the asset at `url` into `dest`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the download fails.
    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64>;
}

/// [`ReleaseFeed`] backed by the GitHub Releases API.
pub struct GitHubReleaseFeed {
    client: reqwest::blocking::Client,
    url: String,
}

impl GitHubReleaseFeed {
    /// Create a feed reading from `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::network(&url, format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, url })
    }
}

impl ReleaseFeed for GitHubReleaseFeed {
    fn list_releases(&self, token: Option<&str>) -> Result<Vec<Release>> {
        debug!(url = %self.url, authenticated = token.is_some(), "Fetching release list");

        let mut request = self
            .client
            .get(&self.url)
            .query(&[("per_page", "100")])
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = token {
            request = request.header("Authorization", format!("token {token}"));
        }

        let response = request
            .send()
            .map_err(|e| Error::network(&self.url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::network(
                &self.url,
                format!("HTTP {}", response.status()),
            ));
        }

        response
            .json()
            .map_err(|e| Error::network(&self.url, format!("failed to parse releases: {e}")))
    }

    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        debug!(%url, "Downloading release asset");

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::network(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::network(url, format!("HTTP {}", response.status())));
        }

        response
            .copy_to(dest)
            .map_err(|e| Error::network(url, format!("failed to read body: {e}")))
    }
}

/// Resolves version selectors against a [`ReleaseFeed`].
pub struct ReleaseCatalog {
    feed: Box<dyn ReleaseFeed>,
    token: Option<String>,
}

impl ReleaseCatalog {
    /// Create a catalog over `feed`, authenticating with `token` when present.
    #[must_use]
    pub fn new(feed: Box<dyn ReleaseFeed>, token: Option<String>) -> Self {
        Self { feed, token }
    }

    /// The underlying feed.
    #[must_use]
    pub fn feed(&self) -> &dyn ReleaseFeed {
        self.feed.as_ref()
    }

    /// List releases in feed order; index 0 is the newest.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be read.
    pub fn list_releases(&self) -> Result<Vec<Release>> {
        self.feed.list_releases(self.token.as_deref())
    }

    /// Resolve a selector to a release, or to a source build for `git`.
    ///
    /// `git` never touches the feed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReleaseNotFound`] if the tag is absent, or when the
    /// feed is empty for `latest`.
    pub fn resolve(&self, selector: &VersionSelector) -> Result<Resolution> {
        if selector.is_git() {
            return Ok(Resolution::Git);
        }

        let releases = self.list_releases()?;
        let release = match selector {
            VersionSelector::Latest => releases.into_iter().next(),
            VersionSelector::Tag(tag) => releases.into_iter().find(|r| &r.tag == tag),
            VersionSelector::Git => None,
        }
        .ok_or_else(|| Error::release_not_found(selector.to_string()))?;

        info!(%selector, tag = %release.tag, "Resolved release");
        Ok(Resolution::Release(release))
    }
}
