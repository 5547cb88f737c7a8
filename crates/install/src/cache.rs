//! Tag-keyed cache of downloaded release archives.
//!
//! One file per release tag under the cache root. An entry is trusted as
//! soon as it exists: it is never refreshed or re-downloaded.
//!
//! ```text
//! ~/.extism/cache/
//! ├── v1.0.0
//! └── v1.1.0
//! ```

use crate::paths;
use crate::platform::Platform;
use crate::release::{Asset, Release, ReleaseFeed};
use crate::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Cache of release archives keyed by tag.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Create a cache at the specified root directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the archive for `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTag`] if `tag` would leave the cache root.
    pub fn entry_path(&self, tag: &str) -> Result<PathBuf> {
        Ok(self.root.join(paths::tag_component(tag)?))
    }

    /// Get the cached archive for `tag` if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTag`] if `tag` would leave the cache root.
    pub fn get(&self, tag: &str) -> Result<Option<PathBuf>> {
        let path = self.entry_path(tag)?;
        if path.exists() {
            trace!(tag, ?path, "Cache hit for release");
            Ok(Some(path))
        } else {
            trace!(tag, "Cache miss for release");
            Ok(None)
        }
    }

    /// Return the cached archive for `release`, downloading it first if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no prebuilt artifacts, no asset
    /// matches, or the download fails.
    pub fn get_or_fetch(
        &self,
        release: &Release,
        platform: &Platform,
        libc: &str,
        feed: &dyn ReleaseFeed,
    ) -> Result<PathBuf> {
        if let Some(path) = self.get(&release.tag)? {
            debug!(tag = %release.tag, ?path, "Release already cached");
            return Ok(path);
        }

        let prefix = platform.asset_prefix(libc)?;
        let asset = select_asset(release, &prefix)?;

        info!(tag = %release.tag, asset = %asset.name, "Downloading release");

        std::fs::create_dir_all(&self.root)?;
        let dest = self.entry_path(&release.tag)?;

        // Download next to the final entry so a partial file never becomes one
        let mut file = tempfile::NamedTempFile::new_in(&self.root)?;
        let bytes = feed.download(&asset.download_url, file.as_file_mut())?;
        file.flush()?;
        file.as_file().sync_all()?;
        file.persist(&dest).map_err(|e| Error::Io(e.error))?;

        debug!(tag = %release.tag, bytes, ?dest, "Stored release in cache");
        Ok(dest)
    }
}

/// Pick the artifact for `prefix`: the first non-text asset whose name starts
/// with it, in catalog order.
///
/// # Errors
///
/// Returns [`Error::NoMatchingAsset`] listing every non-text asset if none match.
pub fn select_asset<'a>(release: &'a Release, prefix: &str) -> Result<&'a Asset> {
    release
        .assets
        .iter()
        .find(|asset| asset.name.starts_with(prefix) && !asset.is_text())
        .ok_or_else(|| {
            let available = release
                .assets
                .iter()
                .filter(|asset| !asset.is_text())
                .map(|asset| asset.name.clone())
                .collect();
            Error::no_matching_asset(prefix, available)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Os;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingFeed {
        body: Vec<u8>,
        downloads: AtomicUsize,
    }

    impl CountingFeed {
        fn new(body: &[u8]) -> Self {
            Self {
                body: body.to_vec(),
                downloads: AtomicUsize::new(0),
            }
        }
    }

    impl ReleaseFeed for CountingFeed {
        fn list_releases(&self, _token: Option<&str>) -> Result<Vec<Release>> {
            Ok(Vec::new())
        }

        fn download(&self, _url: &str, dest: &mut dyn Write) -> Result<u64> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            dest.write_all(&self.body)?;
            Ok(self.body.len() as u64)
        }
    }

    struct FailingFeed;

    impl ReleaseFeed for FailingFeed {
        fn list_releases(&self, _token: Option<&str>) -> Result<Vec<Release>> {
            Ok(Vec::new())
        }

        fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
            dest.write_all(b"partial")?;
            Err(Error::network(url, "connection reset"))
        }
    }

    fn asset(name: &str) -> Asset {
        Asset {
            name: name.to_string(),
            download_url: format!("https://example.invalid/{name}"),
        }
    }

    fn release(tag: &str, names: &[&str]) -> Release {
        Release {
            tag: tag.to_string(),
            name: Some(tag.to_string()),
            assets: names.iter().map(|n| asset(n)).collect(),
            tarball_url: None,
        }
    }

    fn linux() -> Platform {
        Platform::new(Os::Linux, "x86_64", "gnu")
    }

    #[test]
    fn test_entry_path() {
        let cache = ArtifactCache::new("/tmp/cache");
        assert_eq!(
            cache.entry_path("v1.0.0").unwrap(),
            PathBuf::from("/tmp/cache/v1.0.0")
        );
    }

    #[test]
    fn test_escaping_tag_never_downloads() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path().join("cache"));
        let feed = CountingFeed::new(b"archive bytes");
        let release = release("../escape", &["libextism-x86_64-unknown-linux-gnu.tar.gz"]);

        let err = cache.get_or_fetch(&release, &linux(), "gnu", &feed).unwrap_err();
        assert!(matches!(err, Error::InvalidTag { ref tag } if tag == "../escape"));
        assert_eq!(feed.downloads.load(Ordering::SeqCst), 0);
        assert!(!temp.path().join("escape").exists());
        assert!(!cache.root().exists());
    }

    #[test]
    fn test_select_asset_first_match() {
        let release = release(
            "v1.0.0",
            &[
                "libextism-x86_64-unknown-linux-gnu-v1.0.0.txt",
                "libextism-x86_64-unknown-linux-gnu-v1.0.0.tar.gz",
                "libextism-x86_64-unknown-linux-gnu-v1.0.0-alt.tar.gz",
            ],
        );
        let selected = select_asset(&release, "libextism-x86_64-unknown-linux-gnu").unwrap();
        assert_eq!(selected.name, "libextism-x86_64-unknown-linux-gnu-v1.0.0.tar.gz");
    }

    #[test]
    fn test_select_asset_none_lists_non_text() {
        let release = release(
            "v1.0.0",
            &[
                "libextism-aarch64-apple-darwin-v1.0.0.tar.gz",
                "checksums.txt",
            ],
        );
        let err = select_asset(&release, "libextism-x86_64-unknown-linux-musl").unwrap_err();
        match err {
            Error::NoMatchingAsset { available, .. } => {
                assert_eq!(available, vec!["libextism-aarch64-apple-darwin-v1.0.0.tar.gz"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_get_or_fetch_downloads_once() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path().join("cache"));
        let feed = CountingFeed::new(b"archive bytes");
        let release = release("v1.0.0", &["libextism-x86_64-unknown-linux-gnu-v1.0.0.tar.gz"]);

        let first = cache.get_or_fetch(&release, &linux(), "gnu", &feed).unwrap();
        assert_eq!(std::fs::read(&first).unwrap(), b"archive bytes");
        assert_eq!(feed.downloads.load(Ordering::SeqCst), 1);

        let second = cache.get_or_fetch(&release, &linux(), "gnu", &feed).unwrap();
        assert_eq!(first, second);
        assert_eq!(feed.downloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_existing_entry_skips_platform_checks() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path());
        std::fs::write(cache.entry_path("v1.0.0").unwrap(), b"stale").unwrap();

        let feed = CountingFeed::new(b"fresh");
        let windows = Platform::new(Os::Windows, "x86_64", "gnu");
        let path = cache
            .get_or_fetch(&release("v1.0.0", &[]), &windows, "gnu", &feed)
            .unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"stale");
        assert_eq!(feed.downloads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_download_leaves_no_entry() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path().join("cache"));
        let release = release("v1.0.0", &["libextism-x86_64-unknown-linux-gnu-v1.0.0.tar.gz"]);

        let err = cache
            .get_or_fetch(&release, &linux(), "gnu", &FailingFeed)
            .unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
        assert!(cache.get("v1.0.0").unwrap().is_none());
    }

    #[test]
    fn test_unsupported_platform_does_not_create_cache() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path().join("cache"));
        let feed = CountingFeed::new(b"");
        let windows = Platform::new(Os::Windows, "x86_64", "gnu");

        let err = cache
            .get_or_fetch(&release("v1.0.0", &[]), &windows, "gnu", &feed)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlatform { .. }));
        assert!(!cache.root().exists());
    }
}
