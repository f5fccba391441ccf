// src/watch/debounce.rs

//! Per-path debounce buffer.
//!
//! A change is released once its path has been quiet for the whole window,
//! so one save that produces several raw events yields one rebuild. The
//! buffer is pure: callers pass the current instant in.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::types::ChangeKind;

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: ChangeKind,
    last_seen: Instant,
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Record a raw event.
    ///
    /// Merge rules for a path that already has a pending change:
    /// - Removed then Created/Modified: the file was restored, keep the new kind.
    /// - Modified then Removed: the file is gone, keep Removed.
    /// - Created then Removed: it never really existed, drop the entry.
    /// - otherwise the first kind wins.
    ///
    /// Every event restarts the path's quiet window.
    pub fn add(&mut self, path: PathBuf, kind: ChangeKind, now: Instant) {
        let Some(existing) = self.pending.get_mut(&path) else {
            trace!(path = %path.display(), kind = kind.label(), "debounce: new change");
            self.pending.insert(path, Pending { kind, last_seen: now });
            return;
        };

        match (existing.kind, kind) {
            (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                existing.kind = kind;
            }
            (ChangeKind::Modified, ChangeKind::Removed) => {
                existing.kind = ChangeKind::Removed;
            }
            (ChangeKind::Created, ChangeKind::Removed) => {
                trace!(path = %path.display(), "debounce: created then removed, dropped");
                self.pending.remove(&path);
                return;
            }
            _ => {}
        }
        existing.last_seen = now;
    }

    /// Remove and return every change whose window has elapsed, sorted by
    /// path.
    pub fn take_ready(&mut self, now: Instant) -> Vec<(PathBuf, ChangeKind)> {
        let window = self.window;
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.last_seen) >= window)
            .map(|(path, _)| path.clone())
            .collect();

        let mut out: Vec<(PathBuf, ChangeKind)> = ready
            .into_iter()
            .filter_map(|path| self.pending.remove(&path).map(|p| (path, p.kind)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Earliest instant at which some pending change becomes ready.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .values()
            .map(|p| p.last_seen + self.window)
            .min()
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.pending.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Editor artifacts and dotfiles never trigger rebuilds.
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
