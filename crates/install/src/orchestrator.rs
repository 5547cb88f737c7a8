//! Installer façade.
//!
//! Composes the catalog, cache, source checkout, builder and linker into the
//! user-facing operations. An install walks through
//! [`Stage::Resolved`] → [`Stage::Acquired`] → ([`Stage::Built`]) →
//! [`Stage::Linked`] → [`Stage::ConfigPersisted`]; the first failing stage
//! aborts the rest.

use crate::build::{BuildMode, BuildOptions, Builder};
use crate::cache::ArtifactCache;
use crate::config::{self, ConfigOverrides, ConfigStore, InstallConfig};
use crate::link::{LinkedFiles, Linker, UnlinkReport};
use crate::platform::{LIBRARY_NAME, Platform};
use crate::process::{CommandRunner, SystemRunner};
use crate::release::{
    GitHubReleaseFeed, Release, ReleaseCatalog, ReleaseFeed, Resolution, VersionSelector,
};
use crate::settings::InstallerSettings;
use crate::source::{DEFAULT_BRANCH, SourceRepository, SyncOutcome};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Version recorded for source installs.
pub const GIT_VERSION: &str = "git";

/// A completed step of an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The selector was resolved to a release or to a source build.
    Resolved,
    /// The archive was cached or the checkout synced.
    Acquired,
    /// The native build finished.
    Built,
    /// Library and header were placed in the prefix.
    Linked,
    /// The new state was written to the config record.
    ConfigPersisted,
}

/// Options for acquiring a release archive or source checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Branch to clone or track for source builds.
    pub branch: String,
    /// Refresh an existing checkout.
    pub refresh: bool,
    /// C runtime flavour for Linux assets; the host's when `None`.
    pub libc: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            refresh: true,
            libc: None,
        }
    }
}

impl FetchOptions {
    /// Sets the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Sets whether an existing checkout is refreshed.
    #[must_use]
    pub const fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Sets the libc flavour.
    #[must_use]
    pub fn with_libc(mut self, libc: impl Into<String>) -> Self {
        self.libc = Some(libc.into());
        self
    }
}

/// Options for [`Installer::install`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Acquisition options.
    pub fetch: FetchOptions,
    /// Build options for source installs.
    pub build: BuildOptions,
    /// Copy through the privilege helper.
    pub elevate: bool,
}

impl InstallOptions {
    /// Sets the acquisition options.
    #[must_use]
    pub fn with_fetch(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    /// Sets the build options.
    #[must_use]
    pub fn with_build(mut self, build: BuildOptions) -> Self {
        self.build = build;
        self
    }

    /// Sets elevation.
    #[must_use]
    pub const fn with_elevate(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }
}

/// What a fetch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// A release archive in the cache.
    Release {
        /// The resolved release.
        release: Release,
        /// Cached archive.
        archive: PathBuf,
    },
    /// A source checkout.
    Source {
        /// Checkout location.
        path: PathBuf,
        /// What the sync did.
        sync: SyncOutcome,
    },
}

impl Acquired {
    /// The resolved release, `None` for source checkouts.
    #[must_use]
    pub const fn release(&self) -> Option<&Release> {
        match self {
            Self::Release { release, .. } => Some(release),
            Self::Source { .. } => None,
        }
    }

    /// Non-fatal warnings from acquisition.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Release { .. } => &[],
            Self::Source { sync, .. } => sync.warnings(),
        }
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Installed version, a release tag or `git`.
    pub version: String,
    /// Install prefix used.
    pub prefix: PathBuf,
    /// Stages completed, in order.
    pub stages: Vec<Stage>,
    /// Installed files.
    pub linked: LinkedFiles,
    /// Non-fatal warnings, e.g. from refreshing the checkout.
    pub warnings: Vec<String>,
}

/// Persisted installation state, as reported by `info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallInfo {
    /// Install prefix.
    pub prefix: PathBuf,
    /// Installed version, if anything was installed.
    pub version: Option<String>,
}

impl InstallInfo {
    /// Compiler flags for the installed header.
    #[must_use]
    pub fn cflags(&self) -> String {
        format!("-I{}", self.prefix.join("include").display())
    }

    /// Linker flags for the installed library.
    #[must_use]
    pub fn libs(&self) -> String {
        format!("-L{} -l{LIBRARY_NAME}", self.prefix.join("lib").display())
    }
}

/// Installs, links and removes libextism.
pub struct Installer {
    settings: InstallerSettings,
    platform: Platform,
    overrides: ConfigOverrides,
    store: ConfigStore,
    catalog: ReleaseCatalog,
    cache: ArtifactCache,
    runner: Arc<dyn CommandRunner>,
    builder: Builder,
    linker: Linker,
}

impl Installer {
    /// Creates an installer talking to the real feed and spawning real
    /// processes.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(settings: InstallerSettings) -> Result<Self> {
        let feed = GitHubReleaseFeed::new(&settings.feed_url)?;
        Ok(Self::with_components(
            settings,
            Box::new(feed),
            Arc::new(SystemRunner),
        ))
    }

    /// Creates an installer over the given feed and process runner.
    #[must_use]
    pub fn with_components(
        settings: InstallerSettings,
        feed: Box<dyn ReleaseFeed>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            platform: Platform::current(),
            overrides: ConfigOverrides::default(),
            store: ConfigStore::new(settings.config_file()),
            catalog: ReleaseCatalog::new(feed, settings.token.clone()),
            cache: ArtifactCache::new(settings.cache_dir()),
            builder: Builder::new(Arc::clone(&runner)),
            linker: Linker::new(Arc::clone(&runner)),
            runner,
            settings,
        }
    }

    /// Sets the platform artifacts are selected for.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Sets values that take precedence over the stored config.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Replaces the discovered privilege helper.
    #[must_use]
    pub fn with_elevation_helper(mut self, helper: Option<PathBuf>) -> Self {
        self.linker = self.linker.with_elevation_helper(helper);
        self
    }

    /// The platform in use.
    #[must_use]
    pub const fn platform(&self) -> &Platform {
        &self.platform
    }

    /// The settings in use.
    #[must_use]
    pub const fn settings(&self) -> &InstallerSettings {
        &self.settings
    }

    /// Effective configuration: overrides, then stored values, then defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored record is unreadable.
    pub fn config(&self) -> Result<InstallConfig> {
        Ok(config::merge(
            self.store.load()?,
            &self.overrides,
            &self.settings.default_source_path(),
        ))
    }

    /// List published releases, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be read.
    pub fn releases(&self) -> Result<Vec<Release>> {
        self.catalog.list_releases()
    }

    /// Resolve `selector` against the catalog.
    ///
    /// # Errors
    ///
    /// See [`ReleaseCatalog::resolve`].
    pub fn resolve(&self, selector: &VersionSelector) -> Result<Resolution> {
        self.catalog.resolve(selector)
    }

    /// Acquire the artifact for `selector` without building or linking.
    ///
    /// # Errors
    ///
    /// Fails on resolution, download or clone errors.
    pub fn fetch(&self, selector: &VersionSelector, options: &FetchOptions) -> Result<Acquired> {
        let resolution = self.resolve(selector)?;
        let config = self.config()?;
        self.acquire(resolution, &config, options)
    }

    /// Build the configured source checkout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Build`] if the toolchain fails.
    pub fn build(&self, options: &BuildOptions) -> Result<()> {
        let config = self.config()?;
        self.builder.build(&config.source_path, options)
    }

    /// Link an already acquired artifact and record it as installed.
    ///
    /// A tag is linked from the cache alone; only `latest` consults the feed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactNotCached`] if the release was never fetched,
    /// or any linking or persistence error.
    pub fn link(
        &self,
        selector: &VersionSelector,
        mode: BuildMode,
        elevate: bool,
    ) -> Result<LinkedFiles> {
        let config = self.config()?;
        let tag = match selector {
            VersionSelector::Git => None,
            VersionSelector::Tag(tag) => Some(tag.clone()),
            VersionSelector::Latest => match self.resolve(selector)? {
                Resolution::Release(release) => Some(release.tag),
                Resolution::Git => None,
            },
        };

        let (linked, version) = match tag {
            None => (
                self.linker.link_from_build(
                    &config.source_path,
                    mode,
                    &config.install_prefix,
                    &self.platform,
                    elevate,
                )?,
                GIT_VERSION.to_string(),
            ),
            Some(tag) => {
                let archive = self
                    .cache
                    .get(&tag)?
                    .ok_or_else(|| Error::ArtifactNotCached { tag: tag.clone() })?;
                (
                    self.linker.link_from_release(
                        &archive,
                        &self.settings.extract_dir(&tag)?,
                        &config.install_prefix,
                        &self.platform,
                        elevate,
                    )?,
                    tag,
                )
            }
        };

        self.persist(config, version)?;
        Ok(linked)
    }

    /// Resolve, acquire, build if needed, link, and persist.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage.
    pub fn install(
        &self,
        selector: &VersionSelector,
        options: &InstallOptions,
    ) -> Result<InstallReport> {
        let mut stages = Vec::new();

        let resolution = self.resolve(selector)?;
        stages.push(Stage::Resolved);

        let config = self.config()?;
        let acquired = self.acquire(resolution, &config, &options.fetch)?;
        stages.push(Stage::Acquired);
        let warnings = acquired.warnings().to_vec();

        let (linked, version) = match acquired {
            Acquired::Source { path, .. } => {
                self.builder.build(&path, &options.build)?;
                stages.push(Stage::Built);
                let linked = self.linker.link_from_build(
                    &path,
                    options.build.mode,
                    &config.install_prefix,
                    &self.platform,
                    options.elevate,
                )?;
                (linked, GIT_VERSION.to_string())
            }
            Acquired::Release { release, archive } => {
                let linked = self.linker.link_from_release(
                    &archive,
                    &self.settings.extract_dir(&release.tag)?,
                    &config.install_prefix,
                    &self.platform,
                    options.elevate,
                )?;
                (linked, release.tag)
            }
        };
        stages.push(Stage::Linked);

        let prefix = config.install_prefix.clone();
        self.persist(config, version.clone())?;
        stages.push(Stage::ConfigPersisted);

        info!(%version, ?prefix, "Installed");
        Ok(InstallReport {
            version,
            prefix,
            stages,
            linked,
            warnings,
        })
    }

    /// Remove the installed library and header. Per-file problems are
    /// reported, never raised.
    ///
    /// # Errors
    ///
    /// Returns an error only if the stored config is unreadable.
    pub fn uninstall(&self, elevate: bool) -> Result<UnlinkReport> {
        let config = self.config()?;
        Ok(self
            .linker
            .unlink(&config.install_prefix, &self.platform, elevate))
    }

    /// Report the effective prefix and installed version.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored config is unreadable.
    pub fn info(&self) -> Result<InstallInfo> {
        let config = self.config()?;
        Ok(InstallInfo {
            prefix: config.install_prefix,
            version: config.version,
        })
    }

    fn acquire(
        &self,
        resolution: Resolution,
        config: &InstallConfig,
        options: &FetchOptions,
    ) -> Result<Acquired> {
        match resolution {
            Resolution::Git => {
                let repo = self.source(&config.source_path);
                let sync = repo.sync(&options.branch, options.refresh)?;
                Ok(Acquired::Source {
                    path: config.source_path.clone(),
                    sync,
                })
            }
            Resolution::Release(release) => {
                let libc = options.libc.as_deref().unwrap_or(&self.platform.libc);
                let archive =
                    self.cache
                        .get_or_fetch(&release, &self.platform, libc, self.catalog.feed())?;
                Ok(Acquired::Release { release, archive })
            }
        }
    }

    fn source(&self, path: &Path) -> SourceRepository {
        SourceRepository::new(path, &self.settings.remote_url, Arc::clone(&self.runner))
    }

    fn persist(&self, mut config: InstallConfig, version: String) -> Result<()> {
        config.version = Some(version);
        debug!(?config, "Persisting install state");
        self.store.save(&config)
    }
}
