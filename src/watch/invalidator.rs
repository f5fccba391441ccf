// src/watch/invalidator.rs

//! The cascading invalidator: watch mode of the compiler.
//!
//! Runs one compile of the entries, watches every source that build touched,
//! and on a debounced add/change recompiles that source through the same
//! ledger. Each `file-built` event evicts the rebuilt destination and every
//! destination that transitively imported it.
//!
//! The loop is a single task selecting over:
//! - compiler events (from the initial compile and every rebuild),
//! - raw file changes,
//! - the debounce deadline,
//! - finished rebuilds,
//! - shutdown.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::compiler::{Compiler, CompilerEvent, RequestId, Responder};
use crate::hash::compute_file_hash;
use crate::watch::debounce::Debouncer;
use crate::watch::evict::Evictor;
use crate::watch::watcher::{FileChange, PathWatcher};

/// Upper bound used when nothing is pending, so the select loop always has
/// a timer to poll.
const IDLE_TICK: Duration = Duration::from_secs(3600);

pub struct Invalidator {
    compiler: Compiler,
    evictor: Arc<dyn Evictor>,
    watcher: Box<dyn PathWatcher>,
    request_id: RequestId,
    debouncer: Debouncer,
    watched: BTreeSet<PathBuf>,
    /// Content hash of each source as of its last successful build.
    hashes: HashMap<PathBuf, String>,
    /// Hash of the bytes a scheduled rebuild is compiling.
    pending_hashes: HashMap<PathBuf, String>,
    in_flight: HashSet<PathBuf>,
    /// Sources that changed again while their rebuild was running.
    rerun: HashSet<PathBuf>,
}

impl std::fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invalidator")
            .field("request_id", &self.request_id)
            .field("watched", &self.watched)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl Invalidator {
    pub fn new(
        compiler: Compiler,
        evictor: Arc<dyn Evictor>,
        watcher: Box<dyn PathWatcher>,
        request_id: RequestId,
        debounce: Duration,
    ) -> Self {
        Self {
            compiler,
            evictor,
            watcher,
            request_id,
            debouncer: Debouncer::new(debounce),
            watched: BTreeSet::new(),
            hashes: HashMap::new(),
            pending_hashes: HashMap::new(),
            in_flight: HashSet::new(),
            rerun: HashSet::new(),
        }
    }

    /// Compile `entries`, then keep rebuilding changed sources until
    /// `shutdown` resolves. Every compiler event is passed to `on_event`
    /// after the matching evictions have happened.
    pub async fn run<F, S>(
        mut self,
        entries: Vec<PathBuf>,
        mut changes: mpsc::UnboundedReceiver<FileChange>,
        mut on_event: F,
        shutdown: S,
    ) where
        F: FnMut(&CompilerEvent) + Send,
        S: Future<Output = ()> + Send,
    {
        let (responder, mut events) = Responder::channel(self.request_id);

        // Completion is observed through the `built` event.
        tokio::spawn({
            let compiler = self.compiler.clone();
            let responder = responder.clone();
            async move { compiler.compile(&entries, &responder).await }
        });

        let mut rebuilds: JoinSet<PathBuf> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            let deadline = self
                .debouncer
                .next_deadline()
                .map(Instant::from_std)
                .unwrap_or_else(|| Instant::now() + IDLE_TICK);

            tokio::select! {
                _ = &mut shutdown => {
                    info!(watched = self.watched.len(), "watch session stopping");
                    break;
                }
                Some(event) = events.recv() => {
                    self.on_compiler_event(&event);
                    on_event(&event);
                }
                Some(change) = changes.recv() => {
                    self.on_change(change);
                }
                _ = sleep_until(deadline) => {
                    let ready = self.debouncer.take_ready(std::time::Instant::now());
                    for (path, kind) in ready {
                        if kind.triggers_rebuild() {
                            self.schedule(path, &responder, &mut rebuilds);
                        }
                    }
                }
                Some(done) = rebuilds.join_next() => {
                    match done {
                        Ok(path) => {
                            self.in_flight.remove(&path);
                            if self.rerun.remove(&path) {
                                debug!(path = %path.display(), "running coalesced follow-up rebuild");
                                self.schedule(path, &responder, &mut rebuilds);
                            }
                        }
                        Err(err) => warn!(error = %err, "rebuild task aborted"),
                    }
                }
            }
        }

        rebuilds.abort_all();
    }

    fn on_compiler_event(&mut self, event: &CompilerEvent) {
        match event {
            CompilerEvent::FileBuilt {
                source,
                dest,
                parents,
                ..
            } => {
                self.evictor.evict(dest);
                for parent in parents {
                    self.evictor.evict(parent);
                }
                debug!(dest = %dest.display(), parents = parents.len(), "evicted rebuilt module and importers");
                self.ensure_watched(source);
                self.record_built_hash(source);
            }
            // A source that failed its first build is still watched so a
            // later valid save recovers it. Its hash is forgotten: the cause
            // may lie outside the file, so an identical re-save must rebuild.
            CompilerEvent::Error {
                source: Some(source),
                ..
            } => {
                self.ensure_watched(source);
                self.hashes.remove(source);
                self.pending_hashes.remove(source);
            }
            _ => {}
        }
    }

    fn ensure_watched(&mut self, source: &Path) {
        if self.watched.contains(source) {
            return;
        }
        if let Err(err) = self.watcher.watch(source) {
            warn!(source = %source.display(), error = %err, "failed to watch source");
            return;
        }
        self.watched.insert(source.to_path_buf());
    }

    /// Remember the bytes a successful build compiled. Rebuilds use the hash
    /// taken when they were scheduled; first builds hash the file now.
    fn record_built_hash(&mut self, source: &Path) {
        let hash = match self.pending_hashes.remove(source) {
            Some(hash) => hash,
            None => match compute_file_hash(self.compiler.fs().as_ref(), source) {
                Ok(hash) => hash,
                Err(err) => {
                    debug!(source = %source.display(), error = %err, "could not hash built source");
                    return;
                }
            },
        };
        self.hashes.insert(source.to_path_buf(), hash);
    }

    fn on_change(&mut self, change: FileChange) {
        if !self.watched.contains(&change.path) {
            return;
        }
        self.debouncer
            .add(change.path, change.kind, std::time::Instant::now());
    }

    fn schedule(&mut self, path: PathBuf, responder: &Responder, rebuilds: &mut JoinSet<PathBuf>) {
        if self.in_flight.contains(&path) {
            debug!(path = %path.display(), "rebuild in flight; coalescing");
            self.rerun.insert(path);
            return;
        }

        match compute_file_hash(self.compiler.fs().as_ref(), &path) {
            Ok(hash) => {
                if self.hashes.get(&path) == Some(&hash) {
                    debug!(path = %path.display(), "content unchanged since last good build; skipping rebuild");
                    return;
                }
                self.pending_hashes.insert(path.clone(), hash);
            }
            Err(err) => debug!(path = %path.display(), error = %err, "could not hash changed file"),
        }

        info!(path = %path.display(), "rebuilding after change");
        self.in_flight.insert(path.clone());
        let compiler = self.compiler.clone();
        let responder = responder.clone();
        rebuilds.spawn(async move {
            compiler.rebuild(&path, &responder).await;
            path
        });
    }
}
