//! Native build of libextism from a source checkout.

use crate::platform::Platform;
use crate::process::{CommandRunner, Invocation};
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Crate directory inside the checkout that the toolchain builds.
pub const BUILD_SUBDIR: &str = "libextism";

/// Feature list used when none is given.
pub const DEFAULT_FEATURE: &str = "default";

/// Optimization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildMode {
    /// Unoptimized toolchain default.
    Debug,
    /// Optimized build.
    #[default]
    Release,
}

impl BuildMode {
    /// Name of the mode, which is also its output directory under `target/`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            other => Err(format!(
                "invalid build mode '{other}', expected 'debug' or 'release'"
            )),
        }
    }
}

/// Options for a source build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Optimization mode.
    pub mode: BuildMode,
    /// Cargo features to enable.
    pub features: Vec<String>,
    /// Disable the crate's default features.
    pub no_default_features: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: BuildMode::Release,
            features: vec![DEFAULT_FEATURE.to_string()],
            no_default_features: false,
        }
    }
}

impl BuildOptions {
    /// Sets the build mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the feature list. An empty list enables no features.
    #[must_use]
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether default features are disabled.
    #[must_use]
    pub const fn with_no_default_features(mut self, no_default_features: bool) -> Self {
        self.no_default_features = no_default_features;
        self
    }

    /// Features actually requested.
    ///
    /// With default features disabled, the bare `default` list means no
    /// features at all.
    #[must_use]
    pub fn effective_features(&self) -> Vec<String> {
        if self.no_default_features && self.features == [DEFAULT_FEATURE] {
            Vec::new()
        } else {
            self.features.clone()
        }
    }

    /// Arguments passed to `cargo`.
    #[must_use]
    pub fn cargo_args(&self) -> Vec<String> {
        let mut args = vec!["build".to_string()];
        if self.mode == BuildMode::Release {
            args.push("--release".to_string());
        }
        if self.no_default_features {
            args.push("--no-default-features".to_string());
        }
        let features = self.effective_features();
        if !features.is_empty() {
            args.push("--features".to_string());
            args.push(features.join(","));
        }
        args
    }
}

/// Paths of the files a build produces inside a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// The shared library.
    pub library: PathBuf,
    /// The C header.
    pub header: PathBuf,
}

impl BuildOutput {
    /// Locate the outputs of a `mode` build of the checkout at `source`.
    #[must_use]
    pub fn locate(source: &Path, mode: BuildMode, platform: &Platform) -> Self {
        Self {
            library: source
                .join("target")
                .join(mode.as_str())
                .join(platform.library_filename()),
            header: source.join("runtime").join(crate::platform::HEADER_FILE),
        }
    }
}

/// Drives `cargo build` inside a source checkout.
pub struct Builder {
    runner: Arc<dyn CommandRunner>,
}

impl Builder {
    /// Create a builder spawning processes through `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Build the checkout at `source`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Build`] with the toolchain's exit status if it fails,
    /// or [`Error::Command`] if `cargo` cannot be started.
    pub fn build(&self, source: &Path, options: &BuildOptions) -> Result<()> {
        let dir = source.join(BUILD_SUBDIR);
        let invocation = Invocation::new("cargo")
            .args(options.cargo_args())
            .current_dir(&dir);

        info!(dir = ?dir, command = %invocation, "Building from source");

        let status = self.runner.run(&invocation)?;
        if !status.success() {
            return Err(Error::Build {
                dir,
                status: status.code,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Os;
    use crate::process::RunStatus;
    use std::sync::Mutex;

    struct RecordingRunner {
        calls: Mutex<Vec<Invocation>>,
        status: RunStatus,
    }

    impl RecordingRunner {
        fn new(status: RunStatus) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                status,
            }
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, invocation: &Invocation) -> Result<RunStatus> {
            self.calls.lock().unwrap().push(invocation.clone());
            Ok(self.status)
        }
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("debug".parse::<BuildMode>().unwrap(), BuildMode::Debug);
        assert_eq!("release".parse::<BuildMode>().unwrap(), BuildMode::Release);
        assert!("fast".parse::<BuildMode>().is_err());
    }

    #[test]
    fn test_default_args() {
        assert_eq!(
            BuildOptions::default().cargo_args(),
            vec!["build", "--release", "--features", "default"]
        );
    }

    #[test]
    fn test_debug_has_no_flag() {
        let args = BuildOptions::default()
            .with_mode(BuildMode::Debug)
            .cargo_args();
        assert_eq!(args, vec!["build", "--features", "default"]);
    }

    #[test]
    fn test_no_default_features_drops_default() {
        let args = BuildOptions::default()
            .with_no_default_features(true)
            .cargo_args();
        assert_eq!(args, vec!["build", "--release", "--no-default-features"]);
    }

    #[test]
    fn test_explicit_empty_features() {
        let args = BuildOptions::default()
            .with_features(Vec::<String>::new())
            .cargo_args();
        assert_eq!(args, vec!["build", "--release"]);
    }

    #[test]
    fn test_custom_features_joined() {
        let args = BuildOptions::default()
            .with_no_default_features(true)
            .with_features(["register-http", "register-filesystem"])
            .cargo_args();
        assert_eq!(
            args,
            vec![
                "build",
                "--release",
                "--no-default-features",
                "--features",
                "register-http,register-filesystem"
            ]
        );
    }

    #[test]
    fn test_build_runs_in_subdir() {
        let runner = Arc::new(RecordingRunner::new(RunStatus::SUCCESS));
        Builder::new(runner.clone())
            .build(Path::new("/src/extism"), &BuildOptions::default())
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].program, "cargo");
        assert_eq!(calls[0].cwd, Some(PathBuf::from("/src/extism/libextism")));
    }

    #[test]
    fn test_build_failure_carries_status() {
        let runner = Arc::new(RecordingRunner::new(RunStatus::from_code(101)));
        let err = Builder::new(runner)
            .build(Path::new("/src/extism"), &BuildOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Build { status: Some(101), .. }));
    }

    #[test]
    fn test_locate_outputs() {
        let platform = Platform::new(Os::Darwin, "arm64", "gnu");
        let output = BuildOutput::locate(Path::new("/src"), BuildMode::Debug, &platform);
        assert_eq!(output.library, PathBuf::from("/src/target/debug/libextism.dylib"));
        assert_eq!(output.header, PathBuf::from("/src/runtime/extism.h"));
    }
}
