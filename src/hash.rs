// src/hash.rs

//! Content hashing (blake3).
//!
//! Used for content-derived asset names, for skipping rebuilds of files whose
//! bytes did not change, and for the build-id token.

use std::path::Path;

use anyhow::Result;
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Hex-encoded blake3 digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let bytes = fs.read(path)?;
    Ok(content_hash(&bytes))
}

/// Compute aggregate hash from a list of `(label, hash)` pairs.
///
/// The pairs are sorted first so the result does not depend on the order in
/// which files finished compiling.
pub fn compute_aggregate_hash(entries: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = entries.iter().collect();
    sorted.sort();

    let mut hasher = Hasher::new();
    for (label, hash) in sorted {
        hasher.update(label.as_bytes());
        hasher.update(b"\0");
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, entries = entries.len(), "computed aggregate hash");
    hash
}
