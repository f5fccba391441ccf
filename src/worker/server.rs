// src/worker/server.rs

//! The worker side: takes requests off a channel and streams tagged
//! responses back.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::compiler::{Compiler, CompilerEvent, Responder};
use crate::types::CompileCommand;
use crate::watch::{Evictor, FileChange, Invalidator, PathWatcher};
use crate::worker::protocol::{WorkerRequest, WorkerResponse};

/// Creates a watcher and the stream of changes it produces.
pub type WatcherFactory =
    Arc<dyn Fn() -> Result<(Box<dyn PathWatcher>, mpsc::UnboundedReceiver<FileChange>)> + Send + Sync>;

/// What the worker needs to serve `watch` requests.
#[derive(Clone)]
pub struct WatchSupport {
    pub evictor: Arc<dyn Evictor>,
    pub watcher_factory: WatcherFactory,
    pub debounce: Duration,
}

impl std::fmt::Debug for WatchSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSupport")
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

/// Spawn the worker loop.
///
/// Requests are served concurrently; the compiler's ledger keeps them from
/// duplicating work. The loop ends when the request channel closes, which
/// also stops every running watch session.
pub fn spawn_worker(
    compiler: Compiler,
    watch_support: Option<WatchSupport>,
) -> (
    mpsc::UnboundedSender<WorkerRequest>,
    mpsc::UnboundedReceiver<WorkerResponse>,
) {
    let (req_tx, mut req_rx) = mpsc::unbounded_channel::<WorkerRequest>();
    let (resp_tx, resp_rx) = mpsc::unbounded_channel::<WorkerResponse>();

    tokio::spawn(async move {
        info!("compile worker started");
        let (stop_tx, stop_rx) = watch::channel(false);

        while let Some(request) = req_rx.recv().await {
            debug!(request_id = request.id, command = ?request.command, files = request.files.len(), "worker request");
            tokio::spawn(serve(
                compiler.clone(),
                watch_support.clone(),
                request,
                resp_tx.clone(),
                stop_rx.clone(),
            ));
        }

        let _ = stop_tx.send(true);
        info!("compile worker finished (request channel closed)");
    });

    (req_tx, resp_rx)
}

async fn serve(
    compiler: Compiler,
    watch_support: Option<WatchSupport>,
    request: WorkerRequest,
    responses: mpsc::UnboundedSender<WorkerResponse>,
    mut stop: watch::Receiver<bool>,
) {
    let id = request.id;
    let (responder, mut events) = Responder::channel(id);

    // Tag every event with the request id on its way out. The ledger keeps
    // the responder for the whole session, so later rebuilds of targets this
    // request touched keep flowing here.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if responses.send(WorkerResponse { id, event }).is_err() {
                debug!(request_id = id, "response channel closed");
                break;
            }
        }
    });

    match request.command {
        CompileCommand::Build => {
            compiler.compile(&request.files, &responder).await;
        }
        CompileCommand::Watch => {
            let Some(support) = watch_support else {
                let err = anyhow::anyhow!("this worker does not support watch requests");
                responder.send(CompilerEvent::request_error(&err));
                return;
            };
            let (watcher, changes) = match (support.watcher_factory)() {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(request_id = id, error = %err, "could not start watcher");
                    responder.send(CompilerEvent::request_error(&err));
                    return;
                }
            };

            let invalidator =
                Invalidator::new(compiler, support.evictor, watcher, id, support.debounce);
            invalidator
                .run(
                    request.files,
                    changes,
                    move |event| responder.send(event.clone()),
                    async move {
                        let _ = stop.wait_for(|stopped| *stopped).await;
                    },
                )
                .await;
        }
    }
}
