//! Host platform detection and release asset naming.
//!
//! Maps the host onto the naming scheme used by published libextism
//! artifacts, e.g. `libextism-aarch64-apple-darwin` or
//! `libextism-x86_64-unknown-linux-musl`.

use crate::{Error, Result};
use std::fmt;

/// Base name of the installed library (`lib<name>.<ext>`).
pub const LIBRARY_NAME: &str = "extism";

/// File name of the installed header.
pub const HEADER_FILE: &str = "extism.h";

/// Default Linux C runtime flavour.
pub const DEFAULT_LIBC: &str = "gnu";

/// Operating system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Os {
    /// macOS.
    Darwin,
    /// Linux.
    Linux,
    /// Windows; no prebuilt artifacts.
    Windows,
    /// Anything else, keeping the reported name for diagnostics.
    Other(String),
}

impl Os {
    /// Get the current OS.
    #[must_use]
    pub fn current() -> Self {
        Self::from_name(std::env::consts::OS)
    }

    /// Classify an OS name (`uname -s` or `std::env::consts::OS` spelling).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "darwin" | "macos" => Self::Darwin,
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            other => Self::Other(other.to_string()),
        }
    }

    /// Shared library file extension.
    #[must_use]
    pub fn shared_lib_extension(&self) -> &'static str {
        match self {
            Self::Darwin => "dylib",
            Self::Windows => "dll",
            Self::Linux | Self::Other(_) => "so",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Darwin => write!(f, "darwin"),
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Normalize an architecture name to the spelling used in asset names.
#[must_use]
pub fn normalize_arch(arch: &str) -> String {
    match arch {
        "arm64" => "aarch64".to_string(),
        "amd64" => "x86_64".to_string(),
        other => other.to_string(),
    }
}

/// Platform identity, derived once per process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture as reported by the host.
    pub arch: String,
    /// C runtime flavour (`gnu`, `musl`).
    pub libc: String,
}

impl Platform {
    /// Create a new platform.
    #[must_use]
    pub fn new(os: Os, arch: impl Into<String>, libc: impl Into<String>) -> Self {
        Self {
            os,
            arch: arch.into(),
            libc: libc.into(),
        }
    }

    /// Get the current platform.
    #[must_use]
    pub fn current() -> Self {
        let libc = if cfg!(target_env = "musl") {
            "musl"
        } else {
            DEFAULT_LIBC
        };
        Self::new(Os::current(), std::env::consts::ARCH, libc)
    }

    /// Shared library file extension for this platform.
    #[must_use]
    pub fn shared_lib_extension(&self) -> &'static str {
        self.os.shared_lib_extension()
    }

    /// File name of the installed library, e.g. `libextism.so`.
    #[must_use]
    pub fn library_filename(&self) -> String {
        format!("lib{LIBRARY_NAME}.{}", self.shared_lib_extension())
    }

    /// Prefix of the release asset built for this platform.
    ///
    /// `libc` only affects Linux. Other operating systems have no prebuilt
    /// artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] for anything but Darwin and Linux.
    pub fn asset_prefix(&self, libc: &str) -> Result<String> {
        let arch = normalize_arch(&self.arch);
        match self.os {
            Os::Darwin => Ok(format!("lib{LIBRARY_NAME}-{arch}-apple-darwin")),
            Os::Linux => Ok(format!("lib{LIBRARY_NAME}-{arch}-unknown-linux-{libc}")),
            Os::Windows | Os::Other(_) => {
                Err(Error::unsupported_platform(self.os.to_string(), &self.arch))
            }
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
