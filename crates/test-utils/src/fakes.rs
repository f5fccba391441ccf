use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::sync::Semaphore;

use hotdag::compiler::{
    ImportScanner, TransformFailure, TransformFuture, TransformOptions, TransformOutput,
    Transformer,
};
use hotdag::watch::{Evictor, PathWatcher};

/// A fake transformer that:
/// - records every invocation
/// - passes code through and reports imports like the real scanner
/// - fails for paths registered with [`FakeTransformer::fail_on`]
/// - optionally waits on a semaphore gate so tests can hold builds in flight.
pub struct FakeTransformer {
    scanner: ImportScanner,
    calls: Mutex<Vec<PathBuf>>,
    failing: Mutex<HashSet<PathBuf>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeTransformer {
    pub fn new() -> Self {
        Self {
            scanner: ImportScanner::new().expect("import scanner regex"),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            gate: None,
        }
    }

    /// Every transform acquires (and releases) one permit before finishing.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn fail_on(&self, path: impl Into<PathBuf>) {
        self.failing.lock().unwrap().insert(path.into());
    }

    pub fn stop_failing(&self, path: &Path) {
        self.failing.lock().unwrap().remove(path);
    }

    pub fn calls_for(&self, path: &Path) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_path() == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for FakeTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for FakeTransformer {
    fn transform<'a>(
        &'a self,
        path: &'a Path,
        source: &'a str,
        _options: &'a TransformOptions,
    ) -> TransformFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(path.to_path_buf());

            if let Some(gate) = &self.gate {
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|e| TransformFailure::new(e.to_string()))?;
            }

            if self.failing.lock().unwrap().contains(path) {
                return Err(TransformFailure {
                    message: format!("unexpected token in {}", path.display()),
                    stack: Some("at FakeTransformer::transform".to_string()),
                });
            }

            Ok(TransformOutput {
                code: source.to_string(),
                imported_specifiers: self.scanner.scan(source),
            })
        })
    }
}

/// Evictor that records every key it was asked to drop.
#[derive(Debug, Default, Clone)]
pub struct RecordingEvictor {
    evicted: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingEvictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evicted(&self) -> Vec<PathBuf> {
        self.evicted.lock().unwrap().clone()
    }

    pub fn evicted_set(&self) -> BTreeSet<PathBuf> {
        self.evicted.lock().unwrap().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.evicted.lock().unwrap().clear();
    }
}

impl Evictor for RecordingEvictor {
    fn evict(&self, key: &Path) {
        self.evicted.lock().unwrap().push(key.to_path_buf());
    }
}

/// Watcher that only records which paths were requested; tests inject
/// changes through their own channel.
#[derive(Debug, Default, Clone)]
pub struct ManualWatcher {
    watched: Arc<Mutex<Vec<PathBuf>>>,
}

impl ManualWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watched(&self) -> Vec<PathBuf> {
        self.watched.lock().unwrap().clone()
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched.lock().unwrap().iter().any(|p| p == path)
    }
}

impl PathWatcher for ManualWatcher {
    fn watch(&mut self, path: &Path) -> Result<()> {
        self.watched.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}
