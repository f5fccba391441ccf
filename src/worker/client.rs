// src/worker/client.rs

//! The requesting side: allocates correlation ids and demultiplexes the
//! shared response stream into one channel per request.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::compiler::{CompilerEvent, RequestId};
use crate::types::CompileCommand;
use crate::worker::protocol::{WorkerRequest, WorkerResponse};

type Routes = Arc<Mutex<HashMap<RequestId, mpsc::UnboundedSender<CompilerEvent>>>>;

fn lock(routes: &Routes) -> MutexGuard<'_, HashMap<RequestId, mpsc::UnboundedSender<CompilerEvent>>> {
    routes.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of one `build` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub total_compiled_files: usize,
    /// `file-built` events, in arrival order.
    pub built: Vec<CompilerEvent>,
    /// `error` events, in arrival order.
    pub errors: Vec<CompilerEvent>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug)]
pub struct WorkerClient {
    next_id: AtomicU64,
    requests: mpsc::UnboundedSender<WorkerRequest>,
    routes: Routes,
}

impl WorkerClient {
    /// Wrap a worker's channel pair; spawns the response demultiplexer.
    pub fn connect(
        requests: mpsc::UnboundedSender<WorkerRequest>,
        mut responses: mpsc::UnboundedReceiver<WorkerResponse>,
    ) -> Self {
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));

        let demux_routes = Arc::clone(&routes);
        tokio::spawn(async move {
            while let Some(WorkerResponse { id, event }) = responses.recv().await {
                let mut routes = lock(&demux_routes);
                match routes.get(&id) {
                    Some(tx) => {
                        if tx.send(event).is_err() {
                            debug!(request_id = id, "requester gone; dropping route");
                            routes.remove(&id);
                        }
                    }
                    None => debug!(request_id = id, "response for unknown request"),
                }
            }
            // Dropping every route closes the per-request receivers.
            lock(&demux_routes).clear();
            debug!("worker response stream ended");
        });

        Self {
            next_id: AtomicU64::new(1),
            requests,
            routes,
        }
    }

    /// Send a request; its events arrive on the returned receiver.
    pub fn request(
        &self,
        command: CompileCommand,
        files: Vec<PathBuf>,
    ) -> Result<(RequestId, mpsc::UnboundedReceiver<CompilerEvent>)> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.routes).insert(id, tx);

        if let Err(err) = self.requests.send(WorkerRequest { id, command, files }) {
            lock(&self.routes).remove(&id);
            return Err(err).context("compile worker is not running");
        }
        debug!(request_id = id, ?command, "request sent");
        Ok((id, rx))
    }

    /// Run a build request to its terminal `built` event.
    pub async fn build(&self, files: Vec<PathBuf>) -> Result<BuildReport> {
        let (id, mut rx) = self.request(CompileCommand::Build, files)?;
        let mut report = BuildReport::default();

        loop {
            let Some(event) = rx.recv().await else {
                bail!("worker stopped before request {id} finished");
            };
            match event {
                CompilerEvent::Built {
                    total_compiled_files,
                } => {
                    report.total_compiled_files = total_compiled_files;
                    break;
                }
                ev @ CompilerEvent::FileBuilt { .. } => report.built.push(ev),
                ev @ CompilerEvent::Error { .. } => report.errors.push(ev),
            }
        }

        self.forget(id);
        info!(
            request_id = id,
            total = report.total_compiled_files,
            errors = report.errors.len(),
            "build finished"
        );
        Ok(report)
    }

    /// Stop routing responses for a request.
    pub fn forget(&self, id: RequestId) {
        lock(&self.routes).remove(&id);
    }

    pub fn outstanding(&self) -> usize {
        lock(&self.routes).len()
    }
}
