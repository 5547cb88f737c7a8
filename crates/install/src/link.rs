//! Placement of the library and header into an install prefix.
//!
//! Files land in `<prefix>/lib` and `<prefix>/include`. Writes into system
//! locations under `/usr/` go through a privilege helper (`sudo`) when one
//! is installed, as do writes the caller explicitly asked to elevate.

use crate::archive;
use crate::build::{BuildMode, BuildOutput};
use crate::platform::{HEADER_FILE, Platform};
use crate::process::{CommandRunner, Invocation};
use crate::{Error, Result};
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Program used to elevate privileges.
pub const ELEVATION_HELPER: &str = "sudo";

/// Destinations below this root are treated as system-protected.
const PROTECTED_ROOT: &str = "/usr/";

/// Installed library path for `platform` under `prefix`.
#[must_use]
pub fn library_dest(prefix: &Path, platform: &Platform) -> PathBuf {
    prefix.join("lib").join(platform.library_filename())
}

/// Installed header path under `prefix`.
#[must_use]
pub fn header_dest(prefix: &Path) -> PathBuf {
    prefix.join("include").join(HEADER_FILE)
}

/// The library and header pair written by a successful link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedFiles {
    /// Installed library.
    pub library: PathBuf,
    /// Installed header.
    pub header: PathBuf,
}

/// Why a file could not be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalProblem {
    /// Nothing was installed at the path.
    NotFound,
    /// Removal was attempted and failed.
    Failed(String),
}

/// A non-fatal failure to remove one installed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalWarning {
    /// File that could not be removed.
    pub path: PathBuf,
    /// What went wrong.
    pub problem: RemovalProblem,
}

impl fmt::Display for RemovalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            RemovalProblem::NotFound => {
                write!(f, "{} does not exist", self.path.display())
            }
            RemovalProblem::Failed(reason) => {
                write!(f, "unable to remove {}: {reason}", self.path.display())
            }
        }
    }
}

/// Per-file outcome of [`Linker::unlink`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlinkReport {
    /// Files that were removed.
    pub removed: Vec<PathBuf>,
    /// Files that could not be removed.
    pub warnings: Vec<RemovalWarning>,
}

impl UnlinkReport {
    /// Whether every file was removed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Copies artifacts into, and removes them from, an install prefix.
pub struct Linker {
    runner: Arc<dyn CommandRunner>,
    helper: Option<PathBuf>,
}

impl Linker {
    /// Create a linker, discovering the privilege helper on `PATH`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        let helper = which::which(ELEVATION_HELPER).ok();
        debug!(?helper, "Privilege helper lookup");
        Self { runner, helper }
    }

    /// Replace the discovered privilege helper.
    #[must_use]
    pub fn with_elevation_helper(mut self, helper: Option<PathBuf>) -> Self {
        self.helper = helper;
        self
    }

    /// The privilege helper in use, if any.
    #[must_use]
    pub fn elevation_helper(&self) -> Option<&Path> {
        self.helper.as_deref()
    }

    /// Whether writes to `dest` go through the privilege helper.
    #[must_use]
    pub fn elevates(&self, dest: &Path, requested: bool) -> bool {
        self.helper.is_some() && (requested || dest.starts_with(PROTECTED_ROOT))
    }

    /// Unpack the cached `archive` into `extract_dir` and install its
    /// library and header.
    ///
    /// # Errors
    ///
    /// Fails if the archive cannot be unpacked, lacks either file, or the
    /// copy into `prefix` fails.
    pub fn link_from_release(
        &self,
        archive: &Path,
        extract_dir: &Path,
        prefix: &Path,
        platform: &Platform,
        elevate: bool,
    ) -> Result<LinkedFiles> {
        archive::extract_tar_gz(archive, extract_dir)?;

        let library_name = platform.library_filename();
        let library = archive::find_file(extract_dir, &library_name)
            .ok_or_else(|| Error::artifact_missing(extract_dir.join(&library_name)))?;
        let header = archive::find_file(extract_dir, HEADER_FILE)
            .ok_or_else(|| Error::artifact_missing(extract_dir.join(HEADER_FILE)))?;

        self.install_pair(&library, &header, prefix, platform, elevate)
    }

    /// Install the library built in `mode` from the checkout at `source`.
    ///
    /// # Errors
    ///
    /// Fails if the build output or header is absent, or the copy fails.
    pub fn link_from_build(
        &self,
        source: &Path,
        mode: BuildMode,
        prefix: &Path,
        platform: &Platform,
        elevate: bool,
    ) -> Result<LinkedFiles> {
        let output = BuildOutput::locate(source, mode, platform);
        self.install_pair(&output.library, &output.header, prefix, platform, elevate)
    }

    /// Remove the installed library and header. Never fails; each file's
    /// problem is reported separately.
    #[must_use]
    pub fn unlink(&self, prefix: &Path, platform: &Platform, elevate: bool) -> UnlinkReport {
        let mut report = UnlinkReport::default();
        for path in [library_dest(prefix, platform), header_dest(prefix)] {
            match self.remove(&path, elevate) {
                Ok(()) => {
                    info!(?path, "Removed");
                    report.removed.push(path);
                }
                Err(problem) => {
                    let warning = RemovalWarning { path, problem };
                    warn!("{warning}");
                    report.warnings.push(warning);
                }
            }
        }
        report
    }

    fn install_pair(
        &self,
        library: &Path,
        header: &Path,
        prefix: &Path,
        platform: &Platform,
        elevate: bool,
    ) -> Result<LinkedFiles> {
        // Both sources must exist before either file is touched
        for source in [library, header] {
            if !source.is_file() {
                return Err(Error::artifact_missing(source));
            }
        }

        if elevate && self.helper.is_none() {
            warn!("Elevation requested but `{ELEVATION_HELPER}` was not found, copying directly");
        }

        let linked = LinkedFiles {
            library: library_dest(prefix, platform),
            header: header_dest(prefix),
        };

        for dest in [&linked.library, &linked.header] {
            if let Some(dir) = dest.parent() {
                self.ensure_dir(dir, elevate)?;
            }
        }

        // Copy both files next to their destinations first; an installed
        // pair is only replaced once both new files are on disk
        let staged_library = staging_path(&linked.library);
        let staged_header = staging_path(&linked.header);
        let staged = self
            .copy(library, &staged_library, elevate)
            .and_then(|()| self.copy(header, &staged_header, elevate));
        if let Err(e) = staged {
            self.discard(&staged_library, elevate);
            self.discard(&staged_header, elevate);
            return Err(e);
        }

        if let Err(e) = self.promote(&staged_library, &linked.library, elevate) {
            self.discard(&staged_library, elevate);
            self.discard(&staged_header, elevate);
            return Err(e);
        }
        info!(path = ?linked.library, "Installed");

        if let Err(e) = self.promote(&staged_header, &linked.header, elevate) {
            self.discard(&staged_header, elevate);
            return Err(e);
        }
        info!(path = ?linked.header, "Installed");

        Ok(linked)
    }

    fn ensure_dir(&self, dir: &Path, elevate: bool) -> Result<()> {
        match std::fs::create_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied && self.elevates(dir, elevate) => {
                self.run_elevated(&["mkdir", "-p"], &[dir], dir)
            }
            Err(e) => Err(permission_or_io(dir, e)),
        }
    }

    fn copy(&self, src: &Path, dest: &Path, elevate: bool) -> Result<()> {
        if self.elevates(dest, elevate) {
            return self.run_elevated(&["cp"], &[src, dest], dest);
        }
        debug!(?src, ?dest, "Copying");
        std::fs::copy(src, dest)
            .map(|_| ())
            .map_err(|e| permission_or_io(dest, e))
    }

    fn promote(&self, staged: &Path, dest: &Path, elevate: bool) -> Result<()> {
        if self.elevates(dest, elevate) {
            return self.run_elevated(&["mv", "-f"], &[staged, dest], dest);
        }
        std::fs::rename(staged, dest).map_err(|e| permission_or_io(dest, e))
    }

    fn discard(&self, staged: &Path, elevate: bool) {
        match self.remove(staged, elevate) {
            Ok(()) | Err(RemovalProblem::NotFound) => {}
            Err(problem) => warn!(path = ?staged, ?problem, "Unable to remove staged file"),
        }
    }

    fn remove(&self, path: &Path, elevate: bool) -> std::result::Result<(), RemovalProblem> {
        // Dangling symlinks count as installed and are removed
        if std::fs::symlink_metadata(path).is_err() {
            return Err(RemovalProblem::NotFound);
        }
        if self.elevates(path, elevate) {
            return self
                .run_elevated(&["rm", "-f"], &[path], path)
                .map_err(|e| RemovalProblem::Failed(e.to_string()));
        }
        std::fs::remove_file(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RemovalProblem::NotFound,
            _ => RemovalProblem::Failed(e.to_string()),
        })
    }

    fn run_elevated(&self, args: &[&str], paths: &[&Path], target: &Path) -> Result<()> {
        let Some(helper) = &self.helper else {
            return Err(Error::command(ELEVATION_HELPER, "not found on PATH"));
        };

        let mut invocation = Invocation::new(helper.to_string_lossy()).args(args.iter().copied());
        for path in paths {
            invocation = invocation.path_arg(path);
        }

        debug!(command = %invocation, "Running elevated");
        let status = self.runner.run(&invocation)?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::InstallPermission {
                path: target.to_path_buf(),
                source: io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("`{invocation}` exited with {:?}", status.code),
                ),
            })
        }
    }
}

/// Hidden sibling of `dest` that a new file is copied to before replacing it.
fn staging_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(dest.file_name().unwrap_or_default());
    name.push(".partial");
    dest.with_file_name(name)
}

fn permission_or_io(path: &Path, error: io::Error) -> Error {
    if error.kind() == io::ErrorKind::PermissionDenied {
        Error::InstallPermission {
            path: path.to_path_buf(),
            source: error,
        }
    } else {
        Error::Io(error)
    }
}
