//! Shared fakes for installer integration tests.

#![allow(dead_code)]

use extism_install::{
    Asset, CommandRunner, Error, Installer, InstallerSettings, Invocation, Os, Platform, Release,
    ReleaseFeed, Result, RunStatus,
};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const LINUX_PREFIX: &str = "libextism-x86_64-unknown-linux-gnu";

pub fn linux() -> Platform {
    Platform::new(Os::Linux, "x86_64", "gnu")
}

/// Build a gzip-compressed tarball holding a library and header.
pub fn release_archive(lib_contents: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in [("libextism.so", lib_contents), ("extism.h", b"#pragma once\n".as_slice())] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// In-memory release feed serving one archive for every asset.
pub struct FakeFeed {
    pub releases: Vec<Release>,
    pub archive: Vec<u8>,
    pub listings: AtomicUsize,
    pub downloads: AtomicUsize,
}

impl FakeFeed {
    /// Releases in the given order, each with a text sidecar and a Linux asset.
    pub fn with_tags(tags: &[&str]) -> Self {
        let releases = tags
            .iter()
            .map(|tag| Release {
                tag: (*tag).to_string(),
                name: Some((*tag).to_string()),
                assets: vec![
                    asset(&format!("{LINUX_PREFIX}-{tag}.txt")),
                    asset(&format!("{LINUX_PREFIX}-{tag}.tar.gz")),
                    asset(&format!("libextism-aarch64-apple-darwin-{tag}.tar.gz")),
                ],
                tarball_url: Some(format!("https://example.invalid/tarball/{tag}")),
            })
            .collect();

        Self {
            releases,
            archive: release_archive(b"prebuilt"),
            listings: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }
}

fn asset(name: &str) -> Asset {
    Asset {
        name: name.to_string(),
        download_url: format!("https://example.invalid/download/{name}"),
    }
}

impl ReleaseFeed for FakeFeed {
    fn list_releases(&self, _token: Option<&str>) -> Result<Vec<Release>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.releases.clone())
    }

    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        if url.ends_with(".txt") {
            return Err(Error::network(url, "text sidecar requested"));
        }
        self.downloads.fetch_add(1, Ordering::SeqCst);
        dest.write_all(&self.archive)?;
        Ok(self.archive.len() as u64)
    }
}

/// Feed shared with a test so its counters stay observable after the
/// installer takes ownership.
pub struct SharedFeed(pub Arc<FakeFeed>);

impl ReleaseFeed for SharedFeed {
    fn list_releases(&self, token: Option<&str>) -> Result<Vec<Release>> {
        self.0.list_releases(token)
    }

    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        self.0.download(url, dest)
    }
}

/// Simulates `git clone` and `cargo build` by laying out the files they
/// would produce.
#[derive(Default)]
pub struct FakeToolchain {
    pub calls: Mutex<Vec<Invocation>>,
}

impl FakeToolchain {
    pub fn rendered_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl CommandRunner for FakeToolchain {
    fn run(&self, invocation: &Invocation) -> Result<RunStatus> {
        self.calls.lock().unwrap().push(invocation.clone());
        match (invocation.program.as_str(), invocation.args.first().map(String::as_str)) {
            ("git", Some("clone")) => {
                let dest = PathBuf::from(invocation.args.last().unwrap());
                std::fs::create_dir_all(dest.join(".git"))?;
                std::fs::create_dir_all(dest.join("runtime"))?;
                std::fs::write(dest.join("runtime").join("extism.h"), b"#pragma once\n")?;
            }
            ("cargo", Some("build")) => {
                let crate_dir = invocation.cwd.clone().unwrap();
                let source = crate_dir.parent().unwrap();
                let mode = if invocation.args.iter().any(|a| a == "--release") {
                    "release"
                } else {
                    "debug"
                };
                let target = source.join("target").join(mode);
                std::fs::create_dir_all(&target)?;
                std::fs::write(target.join("libextism.so"), b"built")?;
            }
            _ => {}
        }
        Ok(RunStatus::SUCCESS)
    }
}

/// Installer over fakes, with all state below `state`.
pub fn installer(state: &Path, feed: Arc<FakeFeed>, toolchain: Arc<FakeToolchain>) -> Installer {
    Installer::with_components(
        InstallerSettings::new(state),
        Box::new(SharedFeed(feed)),
        toolchain,
    )
    .with_platform(linux())
    .with_elevation_helper(None)
}
