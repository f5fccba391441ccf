// src/reload/dispatch.rs

//! Turning a chunk diff into per-route client notifications.

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ReloadSection;
use crate::reload::diff::ChunkDiff;
use crate::reload::route::to_route;
use crate::types::ReloadAction;

/// One message to live clients: `{"action": "reload", "data": ["/about"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub action: ReloadAction,
    pub data: Vec<String>,
}

impl Notification {
    pub fn new(action: ReloadAction, route: impl Into<String>) -> Self {
        Self {
            action,
            data: vec![route.into()],
        }
    }
}

/// Transport that delivers notifications to live clients.
pub trait Publisher: Send + Sync {
    fn publish(&self, notification: &Notification) -> Result<()>;
}

/// Forwards notifications into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelPublisher {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, notification: &Notification) -> Result<()> {
        self.tx
            .send(notification.clone())
            .context("notification receiver closed")
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesPublisher<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> Publisher for JsonLinesPublisher<W> {
    fn publish(&self, notification: &Notification) -> Result<()> {
        let line = serde_json::to_string(notification).context("serialising notification")?;
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}").context("writing notification")?;
        out.flush().context("flushing notifications")?;
        Ok(())
    }
}

/// Maps chunk diffs onto route notifications.
///
/// Every affected route gets exactly one notification. Structural changes
/// reload; code-only changes soft-update, except for the hard-reload routes
/// whose code wraps every other route.
pub struct Dispatcher {
    route_root: String,
    hard_reload: BTreeSet<String>,
    publisher: Arc<dyn Publisher>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("route_root", &self.route_root)
            .field("hard_reload", &self.hard_reload)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        route_root: impl Into<String>,
        hard_reload: impl IntoIterator<Item = String>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            route_root: route_root.into(),
            hard_reload: hard_reload.into_iter().collect(),
            publisher,
        }
    }

    pub fn from_config(section: &ReloadSection, publisher: Arc<dyn Publisher>) -> Self {
        Self::new(
            section.route_root.clone(),
            section.hard_reload_routes.iter().cloned(),
            publisher,
        )
    }

    /// Notifications for a diff: all reloads (sorted by route), then all
    /// soft updates.
    pub fn plan(&self, diff: &ChunkDiff) -> Vec<Notification> {
        let mut reload: BTreeSet<String> = diff
            .structural()
            .into_iter()
            .map(|name| to_route(name, &self.route_root))
            .collect();

        let mut change: BTreeSet<String> = BTreeSet::new();
        for name in &diff.rehashed {
            let route = to_route(name, &self.route_root);
            if self.hard_reload.contains(&route) {
                debug!(route = %route, "escalating soft update to reload");
                reload.insert(route);
            } else {
                change.insert(route);
            }
        }
        change.retain(|route| !reload.contains(route));

        reload
            .into_iter()
            .map(|route| Notification::new(ReloadAction::Reload, route))
            .chain(
                change
                    .into_iter()
                    .map(|route| Notification::new(ReloadAction::Change, route)),
            )
            .collect()
    }

    /// Publish the notifications for `diff` and return them.
    pub fn notify(&self, diff: &ChunkDiff) -> Result<Vec<Notification>> {
        let notifications = self.plan(diff);
        for n in &notifications {
            self.publisher.publish(n)?;
        }
        if !notifications.is_empty() {
            info!(count = notifications.len(), "published reload notifications");
        }
        Ok(notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> (Dispatcher, mpsc::UnboundedReceiver<Notification>) {
        let (publisher, rx) = ChannelPublisher::channel();
        (
            Dispatcher::from_config(&ReloadSection::default(), Arc::new(publisher)),
            rx,
        )
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn structural_changes_reload_and_rehashes_change() {
        let (d, mut rx) = dispatcher();
        let diff = ChunkDiff {
            added: names(&["bundles/pages/new.js"]),
            recovered: names(&["bundles/pages/index.js"]),
            rehashed: names(&["bundles/pages/about/index.js"]),
            ..ChunkDiff::default()
        };

        let sent = d.notify(&diff).unwrap();
        assert_eq!(
            sent,
            vec![
                Notification::new(ReloadAction::Reload, "/"),
                Notification::new(ReloadAction::Reload, "/new"),
                Notification::new(ReloadAction::Change, "/about"),
            ]
        );
        assert_eq!(rx.try_recv().unwrap(), sent[0]);
    }

    #[test]
    fn document_rehash_escalates_to_reload() {
        let (d, _rx) = dispatcher();
        let diff = ChunkDiff {
            rehashed: names(&["bundles/pages/_document.js"]),
            ..ChunkDiff::default()
        };
        assert_eq!(
            d.plan(&diff),
            vec![Notification::new(ReloadAction::Reload, "/_document")]
        );
    }

    #[test]
    fn a_route_is_notified_once() {
        let (d, _rx) = dispatcher();
        // Recovered and rehashed in the same pass.
        let diff = ChunkDiff {
            recovered: names(&["bundles/pages/a.js"]),
            rehashed: names(&["bundles/pages/a.js"]),
            ..ChunkDiff::default()
        };
        assert_eq!(d.plan(&diff), vec![Notification::new(ReloadAction::Reload, "/a")]);
    }

    #[test]
    fn json_lines_format() {
        let publisher = JsonLinesPublisher::new(Vec::new());
        publisher
            .publish(&Notification::new(ReloadAction::Change, "/about"))
            .unwrap();
        let out = String::from_utf8(publisher.into_inner()).unwrap();
        assert_eq!(out, "{\"action\":\"change\",\"data\":[\"/about\"]}\n");
    }
}
