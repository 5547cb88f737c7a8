//! Locations of installer state on disk.
//!
//! Everything lives below a single state directory:
//!
//! ```text
//! ~/.extism/
//! ├── config.json      # persisted InstallConfig
//! ├── cache/<tag>      # downloaded release archives
//! ├── release/<tag>/   # extracted release archives
//! └── extism/          # default source checkout
//! ```
//!
//! `EXTISM_PATH` overrides the state directory for testing and CI.

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "EXTISM_PATH";

/// Get the state directory.
///
/// Resolution order:
/// 1. `EXTISM_PATH` environment variable
/// 2. `~/.extism`
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(STATE_DIR_ENV)
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| Error::config(STATE_DIR_ENV, "Could not determine home directory"))?;

    Ok(home.join(".extism"))
}

/// Path of the persisted configuration record.
#[must_use]
pub fn config_file(state_dir: &Path) -> PathBuf {
    state_dir.join("config.json")
}

/// Directory holding downloaded release archives.
#[must_use]
pub fn cache_dir(state_dir: &Path) -> PathBuf {
    state_dir.join("cache")
}

/// Directory holding extracted release archives, one subdirectory per tag.
#[must_use]
pub fn release_dir(state_dir: &Path) -> PathBuf {
    state_dir.join("release")
}

/// Check that `tag` is usable as a single entry name below the cache and
/// release directories.
///
/// # Errors
///
/// Returns [`Error::InvalidTag`] if `tag` is empty, `.` or `..`, or
/// contains a path separator.
pub fn tag_component(tag: &str) -> Result<&str> {
    let mut components = Path::new(tag).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !tag.contains(['/', '\\']) => Ok(tag),
        _ => Err(Error::InvalidTag {
            tag: tag.to_string(),
        }),
    }
}

/// Default location of the source checkout.
#[must_use]
pub fn default_source_path(state_dir: &Path) -> PathBuf {
    state_dir.join("extism")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dir_override() {
        temp_env::with_var(STATE_DIR_ENV, Some("/tmp/extism-state"), || {
            assert_eq!(state_dir().unwrap(), PathBuf::from("/tmp/extism-state"));
        });
    }

    #[test]
    fn test_state_dir_empty_override_ignored() {
        temp_env::with_var(STATE_DIR_ENV, Some(""), || {
            let dir = state_dir().unwrap();
            assert!(dir.ends_with(".extism"));
        });
    }

    #[test]
    fn test_layout() {
        let root = Path::new("/home/me/.extism");
        assert_eq!(config_file(root), root.join("config.json"));
        assert_eq!(cache_dir(root), root.join("cache"));
        assert_eq!(release_dir(root), root.join("release"));
        assert_eq!(default_source_path(root), root.join("extism"));
    }

    #[test]
    fn test_tag_component() {
        assert_eq!(tag_component("v1.0.0").unwrap(), "v1.0.0");
        for tag in ["", ".", "..", "../v1.0.0", "v1/../../x", "v1.0.0/", "/etc", "a\\b"] {
            assert!(
                matches!(tag_component(tag), Err(Error::InvalidTag { .. })),
                "{tag:?} should be rejected"
            );
        }
    }
}
