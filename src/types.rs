use serde::{Deserialize, Serialize};

/// What a compile request asks the worker to do.
///
/// - `Build`: compile the entries once and report a terminal `built` event.
/// - `Watch`: compile, then keep recompiling changed files (and cascading
///   cache eviction) until the session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileCommand {
    Build,
    Watch,
}

/// Kind of a filesystem change observed for a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Only additions and content changes trigger a rebuild.
    pub fn triggers_rebuild(self) -> bool {
        matches!(self, ChangeKind::Created | ChangeKind::Modified)
    }

    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

/// Notification kind sent to live clients for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadAction {
    /// Structural change: the client reloads the route (or the whole page).
    Reload,
    /// Code-only change: the client swaps the route's code in place.
    Change,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removals_do_not_trigger_rebuilds() {
        assert!(ChangeKind::Created.triggers_rebuild());
        assert!(ChangeKind::Modified.triggers_rebuild());
        assert!(!ChangeKind::Removed.triggers_rebuild());
    }
}
