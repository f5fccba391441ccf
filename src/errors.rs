// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HotdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Filesystem failure tied to a concrete path.
    #[error("IO error on {path:?}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Unable to find import \"{specifier}\" in {importer:?}")]
    Resolution { specifier: String, importer: PathBuf },

    #[error("transform failed: {message}")]
    Transform {
        path: PathBuf,
        message: String,
        stack: Option<String>,
    },

    #[error("{path:?} is outside the configured base directory")]
    OutsideBase { path: PathBuf },

    /// The external bundling pass reported compiler errors.
    #[error("Bundling pass failed with {} error(s): {}", .errors.len(), .errors.join("; "))]
    BuildAbort { errors: Vec<String> },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HotdagError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        HotdagError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HotdagError>;
