// src/watch/evict.rs

//! Cache eviction seam.
//!
//! The invalidator only decides which destinations are stale; dropping
//! cached module state is up to whoever embeds it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;
use crate::hash::content_hash;

/// Drops cached state for one output path. Must be idempotent.
pub trait Evictor: Send + Sync {
    fn evict(&self, key: &Path);
}

/// Evictor that does nothing, for builds without a live module cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvictor;

impl Evictor for NoopEvictor {
    fn evict(&self, _key: &Path) {}
}

#[derive(Debug, Clone)]
pub struct CachedModule {
    pub code: Arc<str>,
    pub hash: String,
}

/// In-memory cache of compiled output, keyed by destination path.
///
/// Loads lazily from disk and only re-reads a module after it has been
/// evicted.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: Mutex<HashMap<PathBuf, CachedModule>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn modules(&self) -> MutexGuard<'_, HashMap<PathBuf, CachedModule>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a module, reading and caching it if necessary.
    pub fn load(&self, fs: &dyn FileSystem, dest: &Path) -> Result<CachedModule> {
        if let Some(module) = self.modules().get(dest) {
            return Ok(module.clone());
        }

        debug!(dest = %dest.display(), "module cache miss");
        let code = fs.read_to_string(dest)?;
        let module = CachedModule {
            hash: content_hash(code.as_bytes()),
            code: Arc::from(code),
        };
        self.modules().insert(dest.to_path_buf(), module.clone());
        Ok(module)
    }

    pub fn contains(&self, dest: &Path) -> bool {
        self.modules().contains_key(dest)
    }

    pub fn len(&self) -> usize {
        self.modules().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Evictor for ModuleCache {
    fn evict(&self, key: &Path) {
        if self.modules().remove(key).is_some() {
            debug!(dest = %key.display(), "evicted cached module");
        }
    }
}
