mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::builders::ConfigFileBuilder;
use common::init_tracing;
use hotdag::errors::HotdagError;
use hotdag::reload::{BundlePass, ChannelPublisher, Dispatcher, Notification, PageFilter, ReloadTracker};
use hotdag::types::ReloadAction;

fn pass(chunks: &[(&str, &str)], failed: &[&str]) -> BundlePass {
    BundlePass {
        chunks: chunks
            .iter()
            .map(|(n, h)| (n.to_string(), h.to_string()))
            .collect::<BTreeMap<_, _>>(),
        failed_chunks: failed.iter().map(|s| s.to_string()).collect(),
        ..BundlePass::default()
    }
}

fn pipeline(
    hard: &[&str],
) -> (
    ReloadTracker,
    Dispatcher,
    tokio::sync::mpsc::UnboundedReceiver<Notification>,
) {
    let mut builder = ConfigFileBuilder::new();
    for route in hard {
        builder = builder.with_hard_reload_route(route);
    }
    let cfg = builder.build();
    let reload = cfg.reload_section();

    let tracker = ReloadTracker::new(PageFilter::new(&reload.page_chunk_pattern).unwrap());
    let (publisher, rx) = ChannelPublisher::channel();
    (tracker, Dispatcher::from_config(reload, Arc::new(publisher)), rx)
}

fn received(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Notification>) -> Vec<(ReloadAction, String)> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        assert_eq!(n.data.len(), 1);
        out.push((n.action, n.data[0].clone()));
    }
    out
}

#[test]
fn first_pass_is_silent_and_later_passes_notify() {
    init_tracing();
    let (mut tracker, dispatcher, mut rx) = pipeline(&[]);

    let first = pass(
        &[
            ("bundles/pages/index.js", "h1"),
            ("bundles/pages/about.js", "h2"),
            ("bundles/vendor.js", "v1"),
        ],
        &[],
    );
    assert!(tracker.record(&first).unwrap().is_none());

    let second = pass(
        &[
            ("bundles/pages/index.js", "h1"),
            ("bundles/pages/about.js", "h2b"),
            ("bundles/pages/blog/index.js", "h3"),
            ("bundles/vendor.js", "v2"),
        ],
        &[],
    );
    let diff = tracker.record(&second).unwrap().unwrap();
    dispatcher.notify(&diff).unwrap();

    assert_eq!(
        received(&mut rx),
        vec![
            (ReloadAction::Reload, "/blog".to_string()),
            (ReloadAction::Change, "/about".to_string()),
        ]
    );
}

#[test]
fn failure_then_recovery_reloads_the_route() {
    init_tracing();
    let (mut tracker, dispatcher, mut rx) = pipeline(&[]);

    tracker
        .record(&pass(&[("bundles/pages/index.js", "a")], &[]))
        .unwrap();

    let broken = pass(
        &[("bundles/pages/index.js", "b")],
        &["bundles/pages/index.js"],
    );
    let diff = tracker.record(&broken).unwrap().unwrap();
    // Still failing code is not hot-swapped.
    assert!(diff.rehashed.is_empty());
    dispatcher.notify(&diff).unwrap();
    assert_eq!(
        received(&mut rx),
        vec![(ReloadAction::Reload, "/".to_string())]
    );

    let fixed = pass(&[("bundles/pages/index.js", "c")], &[]);
    let diff = tracker.record(&fixed).unwrap().unwrap();
    assert!(diff.recovered.contains("bundles/pages/index.js"));
    dispatcher.notify(&diff).unwrap();
    assert_eq!(
        received(&mut rx),
        vec![(ReloadAction::Reload, "/".to_string())]
    );
}

#[test]
fn wrapper_routes_escalate_to_reload() {
    init_tracing();
    let (mut tracker, dispatcher, mut rx) = pipeline(&["/_app"]);

    tracker
        .record(&pass(
            &[
                ("bundles/pages/_document.js", "d1"),
                ("bundles/pages/_app.js", "a1"),
                ("bundles/pages/index.js", "i1"),
            ],
            &[],
        ))
        .unwrap();
    let diff = tracker
        .record(&pass(
            &[
                ("bundles/pages/_document.js", "d2"),
                ("bundles/pages/_app.js", "a2"),
                ("bundles/pages/index.js", "i2"),
            ],
            &[],
        ))
        .unwrap()
        .unwrap();
    dispatcher.notify(&diff).unwrap();

    assert_eq!(
        received(&mut rx),
        vec![
            (ReloadAction::Reload, "/_app".to_string()),
            (ReloadAction::Reload, "/_document".to_string()),
            (ReloadAction::Change, "/".to_string()),
        ]
    );
}

#[test]
fn aborted_pass_keeps_history() {
    init_tracing();
    let (mut tracker, dispatcher, mut rx) = pipeline(&[]);

    let good = pass(&[("bundles/pages/index.js", "h1")], &[]);
    tracker.record(&good).unwrap();

    let aborted = BundlePass {
        errors: vec!["Module not found: ./nope".to_string()],
        ..pass(&[("bundles/pages/index.js", "zzz")], &[])
    };
    match tracker.record(&aborted) {
        Err(HotdagError::BuildAbort { errors }) => assert_eq!(errors.len(), 1),
        other => panic!("expected BuildAbort, got {other:?}"),
    }
    assert_eq!(
        tracker.current().unwrap().hashes["bundles/pages/index.js"],
        "h1"
    );
    assert!(tracker.previous().is_none());

    // The next good pass is diffed against the last good one.
    let next = pass(&[("bundles/pages/index.js", "h2")], &[]);
    let diff = tracker.record(&next).unwrap().unwrap();
    dispatcher.notify(&diff).unwrap();
    assert_eq!(
        received(&mut rx),
        vec![(ReloadAction::Change, "/".to_string())]
    );
}

#[test]
fn bundle_pass_parses_from_bundler_json() {
    let json = r#"{
        "chunks": { "bundles/pages/index.js": "9f86d0" },
        "failedChunks": ["bundles/pages/broken.js"]
    }"#;
    let pass: BundlePass = serde_json::from_str(json).unwrap();
    assert_eq!(pass.chunks.len(), 1);
    assert_eq!(pass.failed_chunks, vec!["bundles/pages/broken.js".to_string()]);
    assert!(pass.errors.is_empty() && pass.warnings.is_empty());
}
