//! Error types for installation operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for installation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, fetching, building or linking libextism.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The host platform has no prebuilt release artifacts.
    #[error("Unsupported platform: {os} ({arch})")]
    #[diagnostic(
        code(extism::install::unsupported_platform),
        help("Prebuilt releases are only published for Linux and macOS, try installing from source with `git`")
    )]
    UnsupportedPlatform {
        /// Operating system name
        os: String,
        /// CPU architecture
        arch: String,
    },

    /// The requested tag is not part of the release catalog.
    #[error("Invalid release {tag}")]
    #[diagnostic(
        code(extism::install::release_not_found),
        help("Run `extism install --list-available` to see published releases")
    )]
    ReleaseNotFound {
        /// The requested tag
        tag: String,
    },

    /// The release has no artifact for this platform.
    #[error("Unable to find suitable release for {prefix}: found {}", .available.join(", "))]
    #[diagnostic(
        code(extism::install::no_matching_asset),
        help("Pass a different --libc, pick another release, or install from source with `git`")
    )]
    NoMatchingAsset {
        /// Asset name prefix that was searched for
        prefix: String,
        /// Names of the non-text assets attached to the release
        available: Vec<String>,
    },

    /// A feed or download request failed.
    #[error("Request to {url} failed: {message}")]
    #[diagnostic(code(extism::install::network))]
    Network {
        /// The requested URL
        url: String,
        /// The error message
        message: String,
    },

    /// The native build exited unsuccessfully.
    #[error("Build failed in {}: {}", .dir.display(), describe_status(.status))]
    #[diagnostic(
        code(extism::install::build),
        help("Check the cargo output above; a Rust toolchain is required to build from source")
    )]
    Build {
        /// Directory the build ran in
        dir: PathBuf,
        /// Exit code of the toolchain, `None` when terminated by a signal
        status: Option<i32>,
    },

    /// Copying into the install prefix was denied.
    #[error("Permission denied writing {}", .path.display())]
    #[diagnostic(
        code(extism::install::permission),
        help("Re-run with --sudo or choose a writable --prefix")
    )]
    InstallPermission {
        /// The destination path
        path: PathBuf,
        /// The underlying source error
        #[source]
        source: std::io::Error,
    },

    /// Cloning the source repository failed.
    #[error("Unable to clone {remote} into {}: {message}", .path.display())]
    #[diagnostic(code(extism::install::source_checkout))]
    SourceCheckout {
        /// Remote URL
        remote: String,
        /// Checkout destination
        path: PathBuf,
        /// The error message
        message: String,
    },

    /// A release archive was requested for linking but never downloaded.
    #[error("Release {tag} has not been fetched")]
    #[diagnostic(
        code(extism::install::not_cached),
        help("Run `extism fetch {tag}` first")
    )]
    ArtifactNotCached {
        /// The release tag
        tag: String,
    },

    /// A release tag that cannot name a single cache entry.
    #[error("Invalid release tag {tag:?}")]
    #[diagnostic(
        code(extism::install::invalid_tag),
        help("Release tags may not be empty or contain path separators, `.` or `..`")
    )]
    InvalidTag {
        /// The rejected tag
        tag: String,
    },

    /// An expected library or header file is absent.
    #[error("Expected artifact not found: {}", .path.display())]
    #[diagnostic(code(extism::install::artifact_missing))]
    ArtifactMissing {
        /// Path that was expected to exist
        path: PathBuf,
    },

    /// A helper program could not be started.
    #[error("Failed to run {program}: {message}")]
    #[diagnostic(code(extism::install::command))]
    Command {
        /// Program name
        program: String,
        /// The error message
        message: String,
    },

    /// The persisted configuration could not be read or written.
    #[error("Configuration error in {}: {message}", .path.display())]
    #[diagnostic(
        code(extism::install::config),
        help("Delete the file to start from defaults")
    )]
    Config {
        /// The config file
        path: PathBuf,
        /// The error message
        message: String,
    },

    /// A cached archive could not be unpacked.
    #[error("Failed to extract {}: {message}", .path.display())]
    #[diagnostic(code(extism::install::archive))]
    Archive {
        /// The archive path
        path: PathBuf,
        /// The error message
        message: String,
    },

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(extism::install::io))]
    Io(#[from] std::io::Error),

    /// Wrapped JSON error.
    #[error("JSON error: {0}")]
    #[diagnostic(code(extism::install::json))]
    Json(#[from] serde_json::Error),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl Error {
    /// Create an unsupported platform error.
    #[must_use]
    pub fn unsupported_platform(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Create a release not found error.
    #[must_use]
    pub fn release_not_found(tag: impl Into<String>) -> Self {
        Self::ReleaseNotFound { tag: tag.into() }
    }

    /// Create a no matching asset error.
    #[must_use]
    pub fn no_matching_asset(prefix: impl Into<String>, available: Vec<String>) -> Self {
        Self::NoMatchingAsset {
            prefix: prefix.into(),
            available,
        }
    }

    /// Create a network error.
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a command error.
    #[must_use]
    pub fn command(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an archive error.
    #[must_use]
    pub fn archive(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an artifact missing error.
    #[must_use]
    pub fn artifact_missing(path: impl Into<PathBuf>) -> Self {
        Self::ArtifactMissing { path: path.into() }
    }
}
