// src/reload/diff.rs

//! Chunk diff between two successive snapshots.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::reload::snapshot::ChunkSnapshot;

/// Which chunks changed between two passes, and how.
///
/// `added`, `removed`, `failed` and `recovered` are structural: the route's
/// shape changed or it moved into or out of an error state. `rehashed`
/// chunks only changed code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChunkDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub recovered: BTreeSet<String>,
    pub rehashed: BTreeSet<String>,
}

impl ChunkDiff {
    /// Chunks that need a structural reload.
    pub fn structural(&self) -> BTreeSet<&str> {
        self.added
            .iter()
            .chain(&self.removed)
            .chain(&self.failed)
            .chain(&self.recovered)
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.failed.is_empty()
            && self.recovered.is_empty()
            && self.rehashed.is_empty()
    }
}

/// Compare `current` with `previous`. No previous snapshot means this is the
/// first pass: there is nothing to report.
pub fn diff(previous: Option<&ChunkSnapshot>, current: &ChunkSnapshot) -> Option<ChunkDiff> {
    let previous = previous?;

    let added: BTreeSet<String> = current
        .hashes
        .keys()
        .filter(|name| !previous.hashes.contains_key(*name))
        .cloned()
        .collect();
    let removed: BTreeSet<String> = previous
        .hashes
        .keys()
        .filter(|name| !current.hashes.contains_key(*name))
        .cloned()
        .collect();
    let failed = current.failed.clone();
    let recovered: BTreeSet<String> = previous.failed.difference(&current.failed).cloned().collect();

    let rehashed: BTreeSet<String> = current
        .hashes
        .iter()
        .filter(|(name, hash)| {
            previous
                .hashes
                .get(*name)
                .is_some_and(|prev| prev != *hash)
        })
        .map(|(name, _)| name.clone())
        .filter(|name| !failed.contains(name))
        .collect();

    Some(ChunkDiff {
        added,
        removed,
        failed,
        recovered,
        rehashed,
    })
}
