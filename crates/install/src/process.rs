//! Blocking subprocess execution for `git`, `cargo` and the privilege helper.

use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run.
    pub program: String,
    /// Arguments, excluding the program.
    pub args: Vec<String>,
    /// Working directory, inherited when `None`.
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// Create an invocation of `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a path argument.
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a finished program exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
}

impl RunStatus {
    /// A zero exit.
    pub const SUCCESS: Self = Self { code: Some(0) };

    /// Create a status from an exit code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Whether the program exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs programs to completion.
pub trait CommandRunner: Send + Sync {
    /// Run `invocation`, blocking until it exits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] if the program cannot be started. A non-zero
    /// exit is not an error here; callers inspect the [`RunStatus`].
    fn run(&self, invocation: &Invocation) -> Result<RunStatus>;
}

/// [`CommandRunner`] spawning real processes with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<RunStatus> {
        debug!(command = %invocation, cwd = ?invocation.cwd, "Running command");

        let mut command = std::process::Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let status = command
            .status()
            .map_err(|e| Error::command(&invocation.program, e.to_string()))?;

        Ok(RunStatus {
            code: status.code(),
        })
    }
}
