// src/config/mod.rs

//! Configuration loading and validation for hotdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate globs, regexes and extension lists (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    BuildSection, ConfigFile, RawConfigFile, ReloadSection, TransformSection, WatchSection,
};
