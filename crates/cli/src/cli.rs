//! Command-line surface.

use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use extism_install::{BuildMode, VersionSelector};
use std::path::PathBuf;

/// Exit code for success
pub const EXIT_OK: i32 = 0;
/// Exit code for any failed operation
pub const EXIT_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "extism")]
#[command(about = "Install and manage the libextism shared library")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Limit output to errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Installation prefix
    #[arg(long, global = true)]
    pub prefix: Option<PathBuf>,

    /// Source checkout location
    #[arg(long, global = true)]
    pub source: Option<PathBuf>,

    /// GitHub token for the release feed
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Use sudo to install files
    #[arg(long, global = true)]
    pub sudo: bool,

    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Download, build if needed, and link libextism")]
    Install {
        /// Version to install: `latest`, a release tag, or `git`
        #[arg(default_value = "latest")]
        version: VersionSelector,
        /// Git branch or tag for source installs
        #[arg(long, default_value = extism_install::source::DEFAULT_BRANCH)]
        branch: String,
        /// Do not update an existing source checkout
        #[arg(long)]
        no_update: bool,
        /// List available versions instead of installing
        #[arg(long)]
        list_available: bool,
    },
    #[command(about = "Download a release or the source without installing")]
    Fetch {
        /// Version to fetch: `latest`, a release tag, or `git`
        #[arg(default_value = "latest")]
        version: VersionSelector,
        /// Git branch or tag for source checkouts
        #[arg(long, default_value = extism_install::source::DEFAULT_BRANCH)]
        branch: String,
        /// Linux libc flavour
        #[arg(long, default_value = extism_install::platform::DEFAULT_LIBC)]
        libc: String,
    },
    #[command(about = "Build libextism from the source checkout")]
    Build {
        /// Cargo build mode
        #[arg(long, default_value = "release", value_parser = parse_mode)]
        mode: BuildMode,
        /// Features to enable; `--features` with no values enables none
        #[arg(long, num_args = 0.., value_delimiter = ',')]
        features: Option<Vec<String>>,
        /// Disable default features
        #[arg(long)]
        no_default_features: bool,
    },
    #[command(about = "Install an already fetched or built libextism")]
    Link {
        /// Version to link: `latest`, a release tag, or `git`
        #[arg(default_value = "latest")]
        version: VersionSelector,
        /// Cargo build mode of the output to link for `git`
        #[arg(long, default_value = "release", value_parser = parse_mode)]
        mode: BuildMode,
    },
    #[command(about = "Remove the installed library and header")]
    Uninstall,
    #[command(about = "Show installation details or compiler flags")]
    Info {
        /// Print include path
        #[arg(long)]
        cflags: bool,
        /// Print link flags
        #[arg(long)]
        libs: bool,
    },
}

fn parse_mode(s: &str) -> Result<BuildMode, String> {
    s.parse()
}

/// Parse command-line arguments
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_defaults() {
        let cli = Cli::try_parse_from(["extism", "install"]).unwrap();
        match cli.command {
            Commands::Install {
                version,
                branch,
                no_update,
                list_available,
            } => {
                assert_eq!(version, VersionSelector::Latest);
                assert_eq!(branch, "main");
                assert!(!no_update);
                assert!(!list_available);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "extism", "install", "git", "--prefix", "/opt/x", "--sudo", "--quiet",
        ])
        .unwrap();
        assert_eq!(cli.prefix, Some(PathBuf::from("/opt/x")));
        assert!(cli.sudo);
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::Install {
                version: VersionSelector::Git,
                ..
            }
        ));
    }

    #[test]
    fn test_build_features() {
        let cli = Cli::try_parse_from([
            "extism",
            "build",
            "--mode",
            "debug",
            "--features",
            "a,b",
            "--no-default-features",
        ])
        .unwrap();
        match cli.command {
            Commands::Build {
                mode,
                features,
                no_default_features,
            } => {
                assert_eq!(mode, BuildMode::Debug);
                assert_eq!(features, Some(vec!["a".to_string(), "b".to_string()]));
                assert!(no_default_features);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_build_features_given_empty() {
        let features = |args: &[&str]| match Cli::try_parse_from(args).unwrap().command {
            Commands::Build { features, .. } => features,
            other => panic!("unexpected command: {other:?}"),
        };

        assert_eq!(features(&["extism", "build"]), None);
        assert_eq!(
            features(&["extism", "build", "--features"]),
            Some(Vec::new())
        );
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(Cli::try_parse_from(["extism", "build", "--mode", "fast"]).is_err());
    }
}
