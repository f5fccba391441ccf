// src/compiler/ledger.rs

//! The build ledger: one record per destination path.
//!
//! The ledger is what makes compilation deduplicating and invalidation
//! cascading:
//! - at most one compile per destination is in flight; later requesters
//!   attach their responder to the existing record instead of re-running the
//!   transform;
//! - every record accumulates the set of destinations that (transitively)
//!   imported it, which is what gets evicted when it changes.
//!
//! Records persist for the whole session so a rebuild triggered by a file
//! change can notify everyone who ever asked for that target. Only
//! [`BuildLedger::reset`] clears them.
//!
//! Import edges (importer dest -> imported dest) are kept in a `petgraph`
//! graph. When a record gains parents, every record reachable from it gains
//! the same parents, so a late importer of `B` is also a parent of
//! everything `B` imports.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Dfs;
use tracing::{debug, trace};

use crate::compiler::events::{RequestId, Responder};

/// Outcome of trying to acquire a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// New record; the caller must compile it.
    Started,
    /// Record already existed; the caller attached to it and must not
    /// compile.
    Joined,
}

/// Outcome of asking to rebuild an already-known source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildClaim {
    /// The caller now owns the rebuild of `dest`.
    Started { dest: PathBuf },
    /// A compile of this target is already running.
    InFlight,
    /// The source was never compiled in this session.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Building,
    Built,
    Failed,
}

/// Everything needed to notify the subscribers of a finished target.
#[derive(Debug, Clone)]
pub struct Completion {
    pub source: PathBuf,
    pub responders: Vec<Responder>,
    pub parents: Vec<PathBuf>,
}

#[derive(Debug)]
struct BuildTarget {
    source: PathBuf,
    state: TargetState,
    responders: BTreeMap<RequestId, Responder>,
    parents: BTreeSet<PathBuf>,
    node: NodeIndex,
}

#[derive(Debug, Default)]
struct LedgerInner {
    targets: HashMap<PathBuf, BuildTarget>,
    /// source path -> destination path
    aliases: HashMap<PathBuf, PathBuf>,
    imports: StableDiGraph<PathBuf, ()>,
}

impl LedgerInner {
    fn resolve_key<'a>(&'a self, path: &'a Path) -> Option<&'a Path> {
        if self.targets.contains_key(path) {
            return Some(path);
        }
        self.aliases.get(path).map(PathBuf::as_path)
    }

    /// `requester` plus everything that already imports `requester`.
    fn inherited_parents(&self, requester: Option<&Path>) -> BTreeSet<PathBuf> {
        let Some(requester) = requester else {
            return BTreeSet::new();
        };
        let mut set = self
            .targets
            .get(requester)
            .map(|t| t.parents.clone())
            .unwrap_or_default();
        set.insert(requester.to_path_buf());
        set
    }

    fn link(&mut self, importer: &Path, imported: &Path) {
        let (Some(from), Some(to)) = (
            self.targets.get(importer).map(|t| t.node),
            self.targets.get(imported).map(|t| t.node),
        ) else {
            return;
        };
        self.imports.update_edge(from, to, ());
    }

    /// Add `parents` to `dest` and to everything `dest` imports.
    fn spread_parents(&mut self, dest: &Path, parents: &BTreeSet<PathBuf>) {
        if parents.is_empty() {
            return;
        }
        let Some(start) = self.targets.get(dest).map(|t| t.node) else {
            return;
        };

        let mut reached = Vec::new();
        let mut dfs = Dfs::new(&self.imports, start);
        while let Some(nx) = dfs.next(&self.imports) {
            if let Some(path) = self.imports.node_weight(nx) {
                reached.push(path.clone());
            }
        }

        for path in reached {
            if let Some(target) = self.targets.get_mut(&path) {
                for parent in parents {
                    if parent != &path {
                        target.parents.insert(parent.clone());
                    }
                }
            }
        }
    }
}

/// Session-owned ledger of build targets.
///
/// Shared by reference (`Arc<BuildLedger>`) between every compile of one
/// build/watch session; all mutations happen under one lock and never
/// across an `.await`.
#[derive(Debug, Default)]
pub struct BuildLedger {
    inner: Mutex<LedgerInner>,
}

impl BuildLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire or join the record for `dest`.
    ///
    /// `requester` is the destination currently being built that imported
    /// `source` (or `None` for top-level and directory entries). The new
    /// record inherits the requester and the requester's parents; a joined
    /// record merges them in.
    pub fn acquire(
        &self,
        source: &Path,
        dest: &Path,
        requester: Option<&Path>,
        responder: &Responder,
    ) -> Acquire {
        let mut inner = self.lock();
        let inherited = inner.inherited_parents(requester);

        if let Some(target) = inner.targets.get_mut(dest) {
            target.responders.insert(responder.id(), responder.clone());
            debug!(?dest, ?requester, state = ?target.state, "joined existing build target");
            if let Some(requester) = requester {
                inner.link(requester, dest);
            }
            inner.spread_parents(dest, &inherited);
            return Acquire::Joined;
        }

        let node = inner.imports.add_node(dest.to_path_buf());
        let mut parents = inherited;
        parents.remove(dest);

        let mut responders = BTreeMap::new();
        responders.insert(responder.id(), responder.clone());

        inner.targets.insert(
            dest.to_path_buf(),
            BuildTarget {
                source: source.to_path_buf(),
                state: TargetState::Building,
                responders,
                parents,
                node,
            },
        );
        inner
            .aliases
            .insert(source.to_path_buf(), dest.to_path_buf());
        if let Some(requester) = requester {
            inner.link(requester, dest);
        }

        trace!(?source, ?dest, "created build target");
        Acquire::Started
    }

    /// Claim a rebuild of a known source (or destination) path.
    ///
    /// The responder is attached so it receives the outcome.
    pub fn begin_rebuild(&self, path: &Path, responder: &Responder) -> RebuildClaim {
        let mut inner = self.lock();
        let Some(dest) = inner.resolve_key(path).map(Path::to_path_buf) else {
            return RebuildClaim::Unknown;
        };
        let Some(target) = inner.targets.get_mut(&dest) else {
            return RebuildClaim::Unknown;
        };

        target.responders.insert(responder.id(), responder.clone());
        if target.state == TargetState::Building {
            return RebuildClaim::InFlight;
        }
        target.state = TargetState::Building;
        RebuildClaim::Started { dest }
    }

    /// Mark `dest` finished and return who to notify.
    pub fn finish(&self, dest: &Path, succeeded: bool) -> Option<Completion> {
        let mut inner = self.lock();
        let target = inner.targets.get_mut(dest)?;
        target.state = if succeeded {
            TargetState::Built
        } else {
            TargetState::Failed
        };
        Some(Completion {
            source: target.source.clone(),
            responders: target.responders.values().cloned().collect(),
            parents: target.parents.iter().cloned().collect(),
        })
    }

    /// Destination recorded for a source (or the path itself if it is a
    /// destination key).
    pub fn dest_for(&self, path: &Path) -> Option<PathBuf> {
        let inner = self.lock();
        inner.resolve_key(path).map(Path::to_path_buf)
    }

    pub fn parents_of(&self, path: &Path) -> Vec<PathBuf> {
        let inner = self.lock();
        inner
            .resolve_key(path)
            .and_then(|dest| inner.targets.get(dest))
            .map(|t| t.parents.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn state_of(&self, path: &Path) -> Option<TargetState> {
        let inner = self.lock();
        inner
            .resolve_key(path)
            .and_then(|dest| inner.targets.get(dest))
            .map(|t| t.state)
    }

    /// Number of distinct requesters attached to a target.
    pub fn subscriber_count(&self, path: &Path) -> usize {
        let inner = self.lock();
        inner
            .resolve_key(path)
            .and_then(|dest| inner.targets.get(dest))
            .map(|t| t.responders.len())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.lock().targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every target. Only valid when the whole session restarts.
    pub fn reset(&self) {
        let mut inner = self.lock();
        *inner = LedgerInner::default();
        debug!("build ledger reset");
    }
}
