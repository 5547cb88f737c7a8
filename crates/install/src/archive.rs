//! Unpacking of cached release archives.

use crate::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;
use walkdir::WalkDir;

/// Unpack the gzip-compressed tarball at `archive` into `dest`.
///
/// Entries are unpacked into a temporary sibling directory that then replaces
/// `dest`, so repeating the extraction is safe and a failed one leaves any
/// previous extraction untouched.
///
/// # Errors
///
/// Returns [`Error::Archive`] if the file is not a readable tar.gz.
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let file = File::open(archive).map_err(|e| Error::archive(archive, e.to_string()))?;
    let staging = tempfile::TempDir::new_in(parent)?;

    Archive::new(GzDecoder::new(file))
        .unpack(staging.path())
        .map_err(|e| Error::archive(archive, e.to_string()))?;

    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    std::fs::rename(staging.keep(), dest)?;

    debug!(?archive, ?dest, "Extracted release archive");
    Ok(())
}

/// Find the first regular file called `name` below `root`.
///
/// Directory entries are visited in file-name order so the result does not
/// depend on filesystem iteration order.
#[must_use]
pub fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .map(walkdir::DirEntry::into_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn write_archive(path: &Path, files: &[(&str, &[u8])]) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_extract_and_find() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("v1.0.0");
        write_archive(
            &archive,
            &[("libextism.so", b"lib"), ("include/extism.h", b"header")],
        );

        let dest = temp.path().join("release").join("v1.0.0");
        extract_tar_gz(&archive, &dest).unwrap();

        let header = find_file(&dest, "extism.h").unwrap();
        assert_eq!(header, dest.join("include").join("extism.h"));
        assert_eq!(std::fs::read(header).unwrap(), b"header");
        assert!(find_file(&dest, "libextism.dylib").is_none());
    }

    #[test]
    fn test_extract_twice_replaces() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("v1.0.0");
        write_archive(&archive, &[("libextism.so", b"lib")]);

        let dest = temp.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.txt"), b"old").unwrap();

        extract_tar_gz(&archive, &dest).unwrap();
        extract_tar_gz(&archive, &dest).unwrap();

        assert!(dest.join("libextism.so").exists());
        assert!(!dest.join("stale.txt").exists());
    }

    #[test]
    fn test_extract_not_an_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("v1.0.0");
        std::fs::write(&archive, b"<html>rate limited</html>").unwrap();

        let dest = temp.path().join("out");
        let err = extract_tar_gz(&archive, &dest).unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
        assert!(!dest.exists());
    }
}
