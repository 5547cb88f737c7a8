//! Installation of the libextism shared library and header.
//!
//! This crate resolves which libextism to install, acquires it either as a
//! prebuilt release archive or as a source checkout, builds it when needed,
//! places the library and header into an install prefix, and remembers the
//! result for later invocations.
//!
//! # Architecture
//!
//! - [`platform`] - Host platform detection and release asset naming
//! - [`config`] - Persisted install state and override merging
//! - [`release`] - Release feed access and selector resolution
//! - [`cache`] - Tag-keyed archive cache
//! - [`source`] - Source checkout clone and refresh
//! - [`build`] - Native toolchain build
//! - [`link`] - Placement into, and removal from, an install prefix
//! - [`orchestrator`] - The [`Installer`] façade composing all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use extism_install::{InstallOptions, Installer, InstallerSettings, VersionSelector};
//!
//! let installer = Installer::new(InstallerSettings::from_env()?)?;
//! let report = installer.install(&VersionSelector::Latest, &InstallOptions::default())?;
//! println!("installed {} into {}", report.version, report.prefix.display());
//! ```

#![warn(missing_docs)]

pub mod archive;
pub mod build;
pub mod cache;
pub mod config;
pub mod error;
pub mod link;
pub mod orchestrator;
pub mod paths;
pub mod platform;
pub mod process;
pub mod release;
pub mod settings;
pub mod source;

pub use build::{BuildMode, BuildOptions, Builder};
pub use cache::ArtifactCache;
pub use config::{ConfigOverrides, ConfigStore, InstallConfig};
pub use error::{Error, Result};
pub use link::{LinkedFiles, Linker, RemovalProblem, RemovalWarning, UnlinkReport};
pub use orchestrator::{
    Acquired, FetchOptions, InstallInfo, InstallOptions, InstallReport, Installer, Stage,
};
pub use platform::{Os, Platform};
pub use process::{CommandRunner, Invocation, RunStatus, SystemRunner};
pub use release::{
    Asset, GitHubReleaseFeed, Release, ReleaseCatalog, ReleaseFeed, Resolution, VersionSelector,
};
pub use settings::InstallerSettings;
pub use source::{SourceRepository, SyncOutcome};
