// src/reload/snapshot.rs

//! Bundling-pass snapshots and their two-generation history.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{HotdagError, Result};
use crate::reload::diff::{ChunkDiff, diff};

/// Page chunks of one completed bundling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSnapshot {
    /// chunk name -> content hash
    pub hashes: BTreeMap<String, String>,
    pub failed: BTreeSet<String>,
}

impl ChunkSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk(mut self, name: impl Into<String>, hash: impl Into<String>) -> Self {
        self.hashes.insert(name.into(), hash.into());
        self
    }

    pub fn with_failed(mut self, name: impl Into<String>) -> Self {
        self.failed.insert(name.into());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hashes.contains_key(name)
    }
}

/// What the external bundler reports after a pass.
///
/// ```json
/// {
///   "chunks": { "bundles/pages/index.js": "9f86d0" },
///   "failedChunks": ["bundles/pages/broken.js"],
///   "errors": [],
///   "warnings": []
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlePass {
    #[serde(default)]
    pub chunks: BTreeMap<String, String>,
    #[serde(default)]
    pub failed_chunks: Vec<String>,
    /// Pass-level compiler errors; any entry aborts diffing for the pass.
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Keeps only chunks that correspond to pages.
#[derive(Debug, Clone)]
pub struct PageFilter {
    pattern: Regex,
}

impl PageFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            HotdagError::ConfigError(format!("invalid page chunk pattern {pattern:?}: {e}"))
        })?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, chunk_name: &str) -> bool {
        self.pattern.is_match(chunk_name)
    }

    pub fn snapshot(&self, pass: &BundlePass) -> ChunkSnapshot {
        ChunkSnapshot {
            hashes: pass
                .chunks
                .iter()
                .filter(|(name, _)| self.matches(name))
                .map(|(name, hash)| (name.clone(), hash.clone()))
                .collect(),
            failed: pass
                .failed_chunks
                .iter()
                .filter(|name| self.matches(name))
                .cloned()
                .collect(),
        }
    }
}

/// Previous/current snapshot pair, advanced once per successful pass.
///
/// Passes must be recorded in the order they completed.
#[derive(Debug, Clone)]
pub struct ReloadTracker {
    filter: PageFilter,
    previous: Option<ChunkSnapshot>,
    current: Option<ChunkSnapshot>,
}

impl ReloadTracker {
    pub fn new(filter: PageFilter) -> Self {
        Self {
            filter,
            previous: None,
            current: None,
        }
    }

    /// Record a finished pass and diff it against the last good one.
    ///
    /// - A pass with errors returns `BuildAbort` and leaves history alone.
    /// - The first good pass returns `None`.
    pub fn record(&mut self, pass: &BundlePass) -> Result<Option<ChunkDiff>> {
        if !pass.errors.is_empty() {
            warn!(errors = pass.errors.len(), "bundling pass failed; skipping reload");
            return Err(HotdagError::BuildAbort {
                errors: pass.errors.clone(),
            });
        }
        for warning in &pass.warnings {
            warn!(warning = %warning, "bundling pass warning");
        }

        let snapshot = self.filter.snapshot(pass);
        let result = diff(self.current.as_ref(), &snapshot);
        debug!(
            chunks = snapshot.hashes.len(),
            failed = snapshot.failed.len(),
            first = self.current.is_none(),
            "recorded bundling pass"
        );
        self.previous = self.current.replace(snapshot);
        Ok(result)
    }

    pub fn previous(&self) -> Option<&ChunkSnapshot> {
        self.previous.as_ref()
    }

    pub fn current(&self) -> Option<&ChunkSnapshot> {
        self.current.as_ref()
    }
}
