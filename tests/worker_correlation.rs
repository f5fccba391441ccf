mod common;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;

use common::builders::ProjectBuilder;
use common::fakes::{FakeTransformer, ManualWatcher, RecordingEvictor};
use common::{init_tracing, recv_until, with_timeout};
use hotdag::compiler::CompilerEvent;
use hotdag::types::{ChangeKind, CompileCommand};
use hotdag::watch::{Evictor, FileChange, PathWatcher};
use hotdag::worker::{
    WatchSupport, WatcherFactory, WorkerClient, WorkerRequest, WorkerResponse, spawn_worker,
};

fn project() -> ProjectBuilder {
    ProjectBuilder::new("/p")
        .file("pages/a.js", "import './shared';\n")
        .file("pages/b.js", "export default 'b';\n")
        .file("pages/shared.js", "export default 1;\n")
}

#[tokio::test]
async fn concurrent_builds_are_routed_by_callback_id() {
    init_tracing();

    let project = project();
    let compiler = project.compiler(Arc::new(FakeTransformer::new()));
    let (requests, responses) = spawn_worker(compiler, None);
    let client = Arc::new(WorkerClient::connect(requests, responses));

    let (first, second) = with_timeout(async {
        tokio::join!(
            client.build(vec![PathBuf::from("pages/a.js")]),
            client.build(vec![PathBuf::from("pages/b.js")]),
        )
    })
    .await;
    let first = first.unwrap();
    let second = second.unwrap();

    let sources = |report: &hotdag::worker::BuildReport| -> BTreeSet<PathBuf> {
        report
            .built
            .iter()
            .filter_map(|e| match e {
                CompilerEvent::FileBuilt { source, .. } => Some(source.clone()),
                _ => None,
            })
            .collect()
    };

    assert_eq!(first.total_compiled_files, 2);
    assert_eq!(
        sources(&first),
        BTreeSet::from([project.path("pages/a.js"), project.path("pages/shared.js")])
    );
    assert_eq!(second.total_compiled_files, 1);
    assert_eq!(sources(&second), BTreeSet::from([project.path("pages/b.js")]));
    assert!(first.is_success() && second.is_success());
    assert_eq!(client.outstanding(), 0);
}

#[tokio::test]
async fn raw_responses_carry_the_request_id() {
    init_tracing();

    let project = project();
    let compiler = project.compiler(Arc::new(FakeTransformer::new()));
    let (requests, mut responses) = spawn_worker(compiler, None);

    requests
        .send(WorkerRequest {
            id: 41,
            command: CompileCommand::Build,
            files: vec![PathBuf::from("pages/b.js")],
        })
        .unwrap();

    let mut seen = Vec::new();
    with_timeout(async {
        while let Some(WorkerResponse { id, event }) = responses.recv().await {
            let done = matches!(event, CompilerEvent::Built { .. });
            seen.push((id, event));
            if done {
                break;
            }
        }
    })
    .await;

    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|(id, _)| *id == 41));

    let json = serde_json::to_value(WorkerResponse {
        id: 41,
        event: seen[1].1.clone(),
    })
    .unwrap();
    assert_eq!(json["callbackId"], 41);
    assert_eq!(json["event"], "built");
    assert_eq!(json["totalCompiledFiles"], 1);
}

#[tokio::test]
async fn watch_without_support_reports_an_error() {
    init_tracing();

    let compiler = project().compiler(Arc::new(FakeTransformer::new()));
    let (requests, responses) = spawn_worker(compiler, None);
    let client = WorkerClient::connect(requests, responses);

    let (_id, mut rx) = client
        .request(CompileCommand::Watch, vec![PathBuf::from("pages/a.js")])
        .unwrap();
    let event = with_timeout(rx.recv()).await.unwrap();
    assert!(matches!(event, CompilerEvent::Error { source: None, .. }));
}

#[tokio::test]
async fn watch_session_streams_rebuilds_and_stops_with_worker() {
    init_tracing();

    let project = project();
    let transformer = Arc::new(FakeTransformer::new());
    let compiler = project.compiler(transformer.clone());

    let watcher = ManualWatcher::new();
    let evictor = RecordingEvictor::new();
    let (change_tx, change_rx) = mpsc::unbounded_channel::<FileChange>();
    let change_rx = Arc::new(Mutex::new(Some(change_rx)));

    let factory_watcher = watcher.clone();
    let watcher_factory: WatcherFactory = Arc::new(
        move || -> Result<(Box<dyn PathWatcher>, mpsc::UnboundedReceiver<FileChange>)> {
            let rx = change_rx
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| anyhow!("watcher already created"))?;
            Ok((Box::new(factory_watcher.clone()), rx))
        },
    );
    let support = WatchSupport {
        evictor: Arc::new(evictor.clone()) as Arc<dyn Evictor>,
        watcher_factory,
        debounce: Duration::from_millis(20),
    };

    let (requests, responses) = spawn_worker(compiler, Some(support));
    let client = WorkerClient::connect(requests, responses);
    let (_id, mut rx) = client
        .request(CompileCommand::Watch, vec![PathBuf::from("pages/a.js")])
        .unwrap();

    with_timeout(recv_until(&mut rx, |e| matches!(e, CompilerEvent::Built { .. }))).await;
    assert!(watcher.is_watching(&project.path("pages/shared.js")));

    let shared = project.path("pages/shared.js");
    project.fs().add_file(&shared, "export default 2;\n");
    change_tx
        .send(FileChange {
            path: shared.clone(),
            kind: ChangeKind::Modified,
        })
        .unwrap();

    let events = with_timeout(recv_until(&mut rx, |e| {
        matches!(e, CompilerEvent::FileBuilt { source, .. } if source == &shared)
    }))
    .await;
    match events.last() {
        Some(CompilerEvent::FileBuilt { parents, .. }) => {
            assert_eq!(parents, &vec![project.out("pages/a.js")])
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(evictor.evicted_set().contains(&project.out("pages/a.js")));
    assert_eq!(transformer.calls_for(&shared), 2);

    // Dropping the client closes the request channel, which ends the session
    // and with it the response stream.
    drop(client);
    let rest = with_timeout(async {
        let mut n = 0;
        while rx.recv().await.is_some() {
            n += 1;
        }
        n
    })
    .await;
    assert_eq!(rest, 0);
}
