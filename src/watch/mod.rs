// src/watch/mod.rs

//! File watching and cascading invalidation.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Debouncing raw change events per path.
//! - Re-running the compiler for changed sources and evicting every cached
//!   module that (transitively) imported them.
//!
//! It does **not** decide what live clients are told; see `reload`.

pub mod debounce;
pub mod evict;
pub mod invalidator;
pub mod path_utils;
pub mod watcher;

pub use debounce::{Debouncer, is_temp_file};
pub use evict::{CachedModule, Evictor, ModuleCache, NoopEvictor};
pub use invalidator::Invalidator;
pub use watcher::{FileChange, NotifyWatcher, PathWatcher, change_kind};
