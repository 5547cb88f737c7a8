//! Command execution.
//!
//! Progress lines ("Installed ...") are suppressed by `--quiet`; requested
//! output (`info`, `install --list-available`) is always printed.

use crate::cli::{Cli, Commands};
use extism_install::{
    Acquired, BuildOptions, ConfigOverrides, FetchOptions, InstallInfo, InstallOptions, Installer,
    InstallerSettings, LinkedFiles, Release,
};
use tracing::instrument;

/// Writes command output to stdout.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    quiet: bool,
}

impl Printer {
    /// Create a printer; `quiet` hides progress lines.
    #[must_use]
    pub const fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Print a progress line unless quiet.
    pub fn status(&self, line: &str) {
        if !self.quiet {
            println!("{line}");
        }
    }

    /// Print requested output.
    pub fn output(&self, line: &str) {
        println!("{line}");
    }

    fn linked(&self, linked: &LinkedFiles) {
        self.status(&format!("Installed {}", linked.library.display()));
        self.status(&format!("Installed {}", linked.header.display()));
    }
}

/// Build the installer for this invocation.
fn installer(cli: &Cli) -> miette::Result<Installer> {
    let settings = InstallerSettings::from_env()?.with_token(cli.github_token.clone());

    let mut overrides = ConfigOverrides::default();
    if let Some(prefix) = &cli.prefix {
        overrides = overrides.with_install_prefix(prefix);
    }
    if let Some(source) = &cli.source {
        overrides = overrides.with_source_path(source);
    }

    Ok(Installer::new(settings)?.with_overrides(overrides))
}

/// Run the parsed command.
#[instrument(skip_all, fields(command = ?cli.command))]
pub fn execute(cli: &Cli) -> miette::Result<()> {
    let printer = Printer::new(cli.quiet);
    let installer = installer(cli)?;

    match &cli.command {
        Commands::Install {
            list_available: true,
            ..
        } => {
            for line in release_listing(&installer.releases()?) {
                printer.output(&line);
            }
        }
        Commands::Install {
            version,
            branch,
            no_update,
            ..
        } => {
            let options = InstallOptions::default()
                .with_fetch(
                    FetchOptions::default()
                        .with_branch(branch)
                        .with_refresh(!no_update),
                )
                .with_elevate(cli.sudo);
            let report = installer.install(version, &options)?;
            printer.linked(&report.linked);
        }
        Commands::Fetch {
            version,
            branch,
            libc,
        } => {
            if version.is_git() {
                printer.status("Getting source from git");
            } else {
                printer.status(&format!("Getting release for {version}"));
            }
            let options = FetchOptions::default().with_branch(branch).with_libc(libc);
            match installer.fetch(version, &options)? {
                Acquired::Release { release, archive } => {
                    printer.status(&format!("Fetched {} to {}", release.tag, archive.display()));
                }
                Acquired::Source { path, .. } => {
                    printer.status(&format!("Source checkout at {}", path.display()));
                }
            }
        }
        Commands::Build {
            mode,
            features,
            no_default_features,
        } => {
            let mut options = BuildOptions::default()
                .with_mode(*mode)
                .with_no_default_features(*no_default_features);
            if let Some(features) = features {
                options = options.with_features(features.iter().cloned());
            }
            let source = installer.config()?.source_path;
            printer.status(&format!("Building from source in {}", source.display()));
            installer.build(&options)?;
        }
        Commands::Link { version, mode } => {
            let linked = installer.link(version, *mode, cli.sudo)?;
            printer.linked(&linked);
        }
        Commands::Uninstall => {
            let report = installer.uninstall(cli.sudo)?;
            for path in &report.removed {
                printer.status(&format!("Removed {}", path.display()));
            }
        }
        Commands::Info { cflags, libs } => {
            if let Some(line) = info_output(&installer.info()?, *cflags, *libs) {
                printer.output(&line);
            }
        }
    }

    Ok(())
}

/// Lines printed by `install --list-available`.
fn release_listing(releases: &[Release]) -> Vec<String> {
    let mut lines = vec!["git".to_string()];
    lines.extend(releases.iter().enumerate().map(|(i, release)| {
        if i == 0 {
            format!("{} (latest)", release.tag)
        } else {
            release.tag.clone()
        }
    }));
    lines
}

/// Text printed by `info`, if any.
fn info_output(info: &InstallInfo, cflags: bool, libs: bool) -> Option<String> {
    match (cflags, libs) {
        (true, true) => Some(format!("{} {}", info.cflags(), info.libs())),
        (true, false) => Some(info.cflags()),
        (false, true) => Some(info.libs()),
        (false, false) => info.version.as_ref().map(|version| {
            format!("Prefix\t{}\nVersion\t{version}", info.prefix.display())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn release(tag: &str) -> Release {
        Release {
            tag: tag.to_string(),
            name: None,
            assets: Vec::new(),
            tarball_url: None,
        }
    }

    fn info(version: Option<&str>) -> InstallInfo {
        InstallInfo {
            prefix: PathBuf::from("/opt/extism"),
            version: version.map(str::to_string),
        }
    }

    #[test]
    fn test_release_listing() {
        let lines = release_listing(&[release("v1.1.0"), release("v1.0.0")]);
        assert_eq!(lines, vec!["git", "v1.1.0 (latest)", "v1.0.0"]);
        assert_eq!(release_listing(&[]), vec!["git"]);
    }

    #[test]
    fn test_info_flags() {
        let info = info(Some("v1.0.0"));
        assert_eq!(
            info_output(&info, true, false).unwrap(),
            "-I/opt/extism/include"
        );
        assert_eq!(
            info_output(&info, false, true).unwrap(),
            "-L/opt/extism/lib -lextism"
        );
        assert_eq!(
            info_output(&info, true, true).unwrap(),
            "-I/opt/extism/include -L/opt/extism/lib -lextism"
        );
    }

    #[test]
    fn test_info_summary_needs_version() {
        assert_eq!(
            info_output(&info(Some("git")), false, false).unwrap(),
            "Prefix\t/opt/extism\nVersion\tgit"
        );
        assert!(info_output(&info(None), false, false).is_none());
    }
}
