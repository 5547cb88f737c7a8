//! `extism` command-line installer for libextism.

// The binary is the only place that writes to the terminal
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;
mod tracing;

use crate::cli::{EXIT_ERROR, EXIT_OK};
use crate::tracing::{TracingConfig, init_tracing};
use std::io::{self, Write};

fn main() {
    let cli = cli::parse();

    let config = TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
    };

    let result = init_tracing(&config).and_then(|()| commands::execute(&cli));

    let code = match result {
        Ok(()) => EXIT_OK,
        Err(report) => {
            eprintln!("{report:?}");
            let _ = io::stderr().flush();
            EXIT_ERROR
        }
    };

    std::process::exit(code);
}
