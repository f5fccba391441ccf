// src/watch/watcher.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::types::ChangeKind;
use crate::watch::debounce::is_temp_file;

/// One raw filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Something that can start watching individual files.
///
/// Production code uses [`NotifyWatcher`]; tests drive the invalidator with a
/// watcher that only records which paths were requested.
pub trait PathWatcher: Send {
    fn watch(&mut self, path: &Path) -> Result<()>;
}

/// `notify`-backed watcher.
///
/// Watching the parent directory (non-recursively) instead of the file
/// itself keeps working across editors that save by rename. Events for
/// unrelated siblings are filtered out downstream.
pub struct NotifyWatcher {
    inner: RecommendedWatcher,
    dirs: HashSet<PathBuf>,
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher")
            .field("dirs", &self.dirs)
            .finish()
    }
}

impl NotifyWatcher {
    /// Create a watcher that forwards changes into `tx`.
    pub fn new(tx: mpsc::UnboundedSender<FileChange>) -> Result<Self> {
        // Called synchronously by notify on its own thread.
        let inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in changes_from_event(&event) {
                        if let Err(err) = tx.send(change) {
                            eprintln!("hotdag: failed to forward notify event: {err}");
                        }
                    }
                }
                Err(err) => {
                    eprintln!("hotdag: file watch error: {err}");
                }
            },
            Config::default(),
        )
        .context("creating filesystem watcher")?;

        Ok(Self {
            inner,
            dirs: HashSet::new(),
        })
    }
}

impl PathWatcher for NotifyWatcher {
    fn watch(&mut self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or(path).to_path_buf();
        if self.dirs.contains(&dir) {
            return Ok(());
        }
        self.inner
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {:?}", dir))?;
        info!(dir = %dir.display(), "watching directory");
        self.dirs.insert(dir);
        Ok(())
    }
}

/// Map a notify event kind onto a change kind; metadata-only and access
/// events are noise.
pub fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        _ => None,
    }
}

fn changes_from_event(event: &Event) -> Vec<FileChange> {
    let Some(kind) = change_kind(&event.kind) else {
        return Vec::new();
    };
    event
        .paths
        .iter()
        .filter(|p| !is_temp_file(p))
        .map(|path| {
            debug!(path = %path.display(), kind = kind.label(), "raw change");
            FileChange {
                path: path.clone(),
                kind,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind};

    #[test]
    fn metadata_and_access_events_are_ignored() {
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime))),
            None
        );
        assert_eq!(change_kind(&EventKind::Access(AccessKind::Any)), None);
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(ChangeKind::Modified)
        );
    }

    #[test]
    fn temp_files_are_dropped_from_events() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/p/pages/a.js"))
            .add_path(PathBuf::from("/p/pages/.a.js.swp"));
        let changes = changes_from_event(&event);
        assert_eq!(
            changes,
            vec![FileChange {
                path: PathBuf::from("/p/pages/a.js"),
                kind: ChangeKind::Created,
            }]
        );
    }
}
