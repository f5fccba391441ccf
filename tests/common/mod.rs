#![allow(dead_code, unused_imports)]

pub use hotdag_test_utils::builders;
pub use hotdag_test_utils::fakes;
pub use hotdag_test_utils::{init_tracing, with_timeout};

use hotdag::compiler::CompilerEvent;
use tokio::sync::mpsc;

/// Drain every event already queued on a response channel.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<CompilerEvent>) -> Vec<CompilerEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// Receive events until one matches `pred`; returns everything received.
pub async fn recv_until<F>(
    rx: &mut mpsc::UnboundedReceiver<CompilerEvent>,
    mut pred: F,
) -> Vec<CompilerEvent>
where
    F: FnMut(&CompilerEvent) -> bool,
{
    let mut out = Vec::new();
    while let Some(ev) = rx.recv().await {
        let done = pred(&ev);
        out.push(ev);
        if done {
            break;
        }
    }
    out
}

pub fn file_built_count(events: &[CompilerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, CompilerEvent::FileBuilt { .. }))
        .count()
}

pub fn error_count(events: &[CompilerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, CompilerEvent::Error { .. }))
        .count()
}
