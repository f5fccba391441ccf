// src/compiler/resolve.rs

//! Import specifier resolution.
//!
//! Only relative specifiers (`./x`, `../x`) are local filesystem imports;
//! everything else is left to the runtime. A local specifier resolves as:
//! 1. the exact path, if it already has an extension;
//! 2. otherwise `<specifier><ext>` for each configured extension, in order;
//! 3. then `<specifier>/index<ext>` for each extension, in order.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use tracing::trace;

use crate::errors::{HotdagError, Result};
use crate::fs::FileSystem;

/// True if the specifier refers to a file relative to the importer.
pub fn is_local_specifier(specifier: &str) -> bool {
    specifier.starts_with('.')
}

/// Resolve a local import of `importer` to a concrete file.
pub fn resolve_import(
    fs: &dyn FileSystem,
    importer: &Path,
    specifier: &str,
    extensions: &[String],
) -> Result<PathBuf> {
    let dir = importer.parent().unwrap_or_else(|| Path::new(""));
    let target = normalize_path(&dir.join(specifier));

    let candidates: Vec<PathBuf> = if target.extension().is_some() {
        vec![target.clone()]
    } else {
        let with_ext = extensions.iter().map(|ext| append_suffix(&target, ext));
        let as_index = extensions
            .iter()
            .map(|ext| append_suffix(&target.join("index"), ext));
        with_ext.chain(as_index).collect()
    };

    for candidate in candidates {
        trace!(?candidate, specifier, "probing import candidate");
        if fs.is_file(&candidate) {
            return Ok(candidate);
        }
    }

    Err(HotdagError::Resolution {
        specifier: specifier.to_string(),
        importer: importer.to_path_buf(),
    })
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Lexically normalise `.` and `..` components (no filesystem access).
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    out.iter().map(|c| c.as_os_str()).collect()
}
