mod common;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;

use common::builders::ProjectBuilder;
use common::fakes::FakeTransformer;
use common::{drain, file_built_count, init_tracing, with_timeout};
use hotdag::compiler::{CompilerEvent, Responder, TargetState};

#[tokio::test]
async fn concurrent_requests_share_one_transform() {
    init_tracing();

    let project = ProjectBuilder::new("/p").file("pages/index.js", "export default 1;\n");
    let gate = Arc::new(Semaphore::new(0));
    let transformer = Arc::new(FakeTransformer::gated(Arc::clone(&gate)));
    let compiler = project.compiler(transformer.clone());
    let index = project.path("pages/index.js");

    let mut receivers = Vec::new();
    let mut tasks = Vec::new();
    for id in 1..=3 {
        let (responder, rx) = Responder::channel(id);
        receivers.push(rx);
        let compiler = compiler.clone();
        tasks.push(tokio::spawn(async move {
            compiler
                .compile(&[PathBuf::from("pages/index.js")], &responder)
                .await
        }));
    }

    // Hold the transform until every requester has attached.
    with_timeout(async {
        while compiler.ledger().subscriber_count(&index) < 3 {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert_eq!(transformer.total_calls(), 1);
    assert_eq!(compiler.ledger().state_of(&index), Some(TargetState::Building));

    gate.add_permits(1);
    let mut totals = Vec::new();
    for task in tasks {
        totals.push(with_timeout(task).await.unwrap());
    }
    totals.sort();
    // Only the request that started the build counts the output.
    assert_eq!(totals, vec![0, 0, 1]);

    assert_eq!(transformer.calls_for(&index), 1);
    for rx in &mut receivers {
        let events = drain(rx);
        assert_eq!(file_built_count(&events), 1, "events: {events:?}");
        assert!(
            events
                .iter()
                .any(|e| matches!(e, CompilerEvent::Built { .. }))
        );
    }
    assert_eq!(compiler.ledger().state_of(&index), Some(TargetState::Built));
}

#[tokio::test]
async fn shared_dependency_is_transformed_once() {
    init_tracing();

    let project = ProjectBuilder::new("/p")
        .file("pages/a.js", "import './shared';\n")
        .file("pages/b.js", "import './shared';\n")
        .file("pages/shared.js", "export const x = 1;\n");
    let transformer = Arc::new(FakeTransformer::new());
    let compiler = project.compiler(transformer.clone());

    let (responder, mut rx) = Responder::channel(1);
    let total = with_timeout(compiler.compile(&[PathBuf::from("pages")], &responder)).await;

    assert_eq!(total, 3);
    assert_eq!(transformer.calls_for(&project.path("pages/shared.js")), 1);
    assert_eq!(transformer.total_calls(), 3);
    assert_eq!(file_built_count(&drain(&mut rx)), 3);
}

#[tokio::test]
async fn later_requester_of_built_target_is_notified_on_rebuild() {
    init_tracing();

    let project = ProjectBuilder::new("/p").file("pages/a.js", "export default 1;\n");
    let transformer = Arc::new(FakeTransformer::new());
    let compiler = project.compiler(transformer.clone());
    let a = project.path("pages/a.js");

    let (first, mut first_rx) = Responder::channel(1);
    with_timeout(compiler.compile(&[PathBuf::from("pages/a.js")], &first)).await;

    // Joins the finished record: nothing is rebuilt, nothing is sent yet.
    let (second, mut second_rx) = Responder::channel(2);
    let total = with_timeout(compiler.compile(&[PathBuf::from("pages/a.js")], &second)).await;
    assert_eq!(total, 0);
    assert_eq!(transformer.calls_for(&a), 1);
    assert_eq!(file_built_count(&drain(&mut second_rx)), 0);
    drain(&mut first_rx);

    project.fs().add_file(&a, "export default 2;\n");
    with_timeout(compiler.rebuild(&a, &first)).await;

    assert_eq!(transformer.calls_for(&a), 2);
    assert_eq!(file_built_count(&drain(&mut first_rx)), 1);
    assert_eq!(file_built_count(&drain(&mut second_rx)), 1);
    assert_eq!(
        project.fs().contents_string(project.out("pages/a.js")).unwrap(),
        "export default 2;\n"
    );
}
