// src/compiler/assets.rs

//! Non-code assets.
//!
//! - Copied assets (e.g. `.json`) land byte-for-byte at the mirrored output
//!   location.
//! - Hashed assets (e.g. `.woff`) are written under a content-derived name in
//!   the output root, and a one-line shim module at the mirrored location
//!   exports the runtime-prefixed URL of the renamed file.
//!
//! Neither kind recurses, and each counts as one produced output.

use std::path::{Path, PathBuf};

use crate::config::BuildSection;
use crate::errors::{HotdagError, Result};
use crate::fs::FileSystem;
use crate::hash::content_hash;

/// Number of hex digits of the content hash kept in renamed asset names.
pub const HASHED_NAME_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Copy,
    Hashed,
}

/// How non-code files are emitted.
#[derive(Debug, Clone)]
pub struct AssetRules {
    copy: Vec<String>,
    hashed: Vec<String>,
    static_prefix: String,
    public_path: String,
}

impl AssetRules {
    pub fn from_build_section(build: &BuildSection) -> Self {
        Self {
            copy: build.copy_assets.clone(),
            hashed: build.hashed_assets.clone(),
            static_prefix: build.static_prefix.clone(),
            public_path: build.public_path.clone(),
        }
    }

    /// Classify an extension including the leading dot (e.g. `".json"`).
    pub fn kind_of(&self, ext: &str) -> Option<AssetKind> {
        if self.copy.iter().any(|e| e == ext) {
            Some(AssetKind::Copy)
        } else if self.hashed.iter().any(|e| e == ext) {
            Some(AssetKind::Hashed)
        } else {
            None
        }
    }

    /// Source of the shim module left at a hashed asset's mirrored location.
    pub fn shim_module(&self, file_name: &str) -> String {
        let url = format!("{}{}", self.static_prefix, file_name);
        // JSON string literals are valid JS string literals.
        let literal = serde_json::Value::String(url).to_string();
        format!("module.exports = {} + {};\n", self.public_path, literal)
    }
}

/// Content-derived file name for a hashed asset, e.g. `3f9a0c1b2d4e5f60.woff`.
pub fn hashed_asset_name(content: &[u8], ext: &str) -> String {
    let hash = content_hash(content);
    format!("{}{}", &hash[..HASHED_NAME_LEN], ext)
}

/// Copy `src` to `dest` unchanged.
pub fn emit_copy(fs: &dyn FileSystem, src: &Path, dest: &Path) -> Result<()> {
    let bytes = fs.read(src).map_err(|e| HotdagError::io(src, format!("{e:#}")))?;
    fs.write(dest, &bytes)
        .map_err(|e| HotdagError::io(dest, format!("{e:#}")))
}

/// Write a hashed asset and its shim; returns the path of the renamed file.
pub fn emit_hashed(
    fs: &dyn FileSystem,
    rules: &AssetRules,
    src: &Path,
    out_dir: &Path,
    shim_dest: &Path,
) -> Result<PathBuf> {
    let bytes = fs.read(src).map_err(|e| HotdagError::io(src, format!("{e:#}")))?;
    let ext = src
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let name = hashed_asset_name(&bytes, &ext);
    let renamed = out_dir.join(&name);

    fs.write(&renamed, &bytes)
        .map_err(|e| HotdagError::io(&renamed, format!("{e:#}")))?;
    fs.write(shim_dest, rules.shim_module(&name).as_bytes())
        .map_err(|e| HotdagError::io(shim_dest, format!("{e:#}")))?;

    Ok(renamed)
}
