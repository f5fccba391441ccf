// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `hotdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hotdag",
    version,
    about = "Incremental, dependency-aware recompilation with hot-reload notifications.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Hotdag.toml` in the current working directory. A missing
    /// default file means "use built-in defaults".
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HOTDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Parse + validate config, print it, but don't compile anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Compile the given entries (files or directories) once.
    Build {
        /// Entries relative to `[build].base_dir`.
        #[arg(default_value = "pages")]
        files: Vec<PathBuf>,
    },
    /// Compile the given entries, then recompile on change until Ctrl-C.
    Watch {
        #[arg(default_value = "pages")]
        files: Vec<PathBuf>,
    },
    /// Diff two bundling-pass snapshots (JSON) and print notifications.
    Diff {
        previous: PathBuf,
        current: PathBuf,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
