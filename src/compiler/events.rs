// src/compiler/events.rs

//! Events a compile request streams back to its requester.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::HotdagError;

/// Correlation id of one compile request.
pub type RequestId = u64;

/// One event of the compiler's response stream.
///
/// Serialises as `{"event": "file-built", ...}` etc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum CompilerEvent {
    /// A code file was compiled and written.
    #[serde(rename_all = "camelCase")]
    FileBuilt {
        source: PathBuf,
        dest: PathBuf,
        /// Local dependencies compiled as part of this file's build.
        local_dep_count: usize,
        /// Every destination whose build (transitively) imported this one.
        parents: Vec<PathBuf>,
    },
    /// A single file failed; siblings and parents are unaffected.
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<PathBuf>,
        message: String,
        stack: String,
    },
    /// Terminal event of a compile request.
    #[serde(rename_all = "camelCase")]
    Built { total_compiled_files: usize },
}

impl CompilerEvent {
    /// Error event attributed to `path`, with the path prefixed onto both the
    /// message and the stack so batch failures stay attributable.
    ///
    /// Transform failures carry the transformer's own stack; every other
    /// error has none beyond its message.
    pub fn file_error(path: &std::path::Path, err: &HotdagError) -> Self {
        let message = format!("{}: {}", path.display(), err);
        let stack = match err {
            HotdagError::Transform {
                stack: Some(stack), ..
            } => format!("{}: {}", path.display(), stack),
            _ => message.clone(),
        };
        CompilerEvent::Error {
            source: Some(path.to_path_buf()),
            message,
            stack,
        }
    }

    /// Error event not tied to a single file (e.g. a failed watch setup).
    pub fn request_error(err: &anyhow::Error) -> Self {
        CompilerEvent::Error {
            source: None,
            message: err.to_string(),
            stack: format!("{err:?}"),
        }
    }
}

/// A response channel: where one requester wants its events delivered.
///
/// Responders are identified by their request id, so attaching the same
/// request to a target twice still delivers each event once.
#[derive(Debug, Clone)]
pub struct Responder {
    id: RequestId,
    tx: mpsc::UnboundedSender<CompilerEvent>,
}

impl Responder {
    pub fn new(id: RequestId, tx: mpsc::UnboundedSender<CompilerEvent>) -> Self {
        Self { id, tx }
    }

    /// Create a responder together with the receiving end of its channel.
    pub fn channel(id: RequestId) -> (Self, mpsc::UnboundedReceiver<CompilerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Deliver an event. A requester that stopped listening is not an error.
    pub fn send(&self, event: CompilerEvent) {
        if self.tx.send(event).is_err() {
            debug!(request_id = self.id, "responder closed; dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_built_serialises_with_event_tag() {
        let ev = CompilerEvent::FileBuilt {
            source: PathBuf::from("pages/a.js"),
            dest: PathBuf::from("out/pages/a.js"),
            local_dep_count: 2,
            parents: vec![],
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "file-built");
        assert_eq!(json["localDepCount"], 2);
    }

    #[test]
    fn file_error_prefixes_path() {
        let err = HotdagError::Resolution {
            specifier: "./nope".into(),
            importer: PathBuf::from("pages/a.js"),
        };
        let ev = CompilerEvent::file_error(std::path::Path::new("pages/a.js"), &err);
        match ev {
            CompilerEvent::Error { message, stack, .. } => {
                assert!(message.starts_with("pages/a.js: "));
                assert!(message.contains("./nope"));
                assert!(stack.starts_with("pages/a.js: "));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[test]
    fn transform_error_uses_transformer_stack() {
        let err = HotdagError::Transform {
            path: PathBuf::from("pages/a.js"),
            message: "Unexpected token (3:4)".into(),
            stack: Some("SyntaxError: Unexpected token\n    at parse (parser.js:10)".into()),
        };
        let ev = CompilerEvent::file_error(std::path::Path::new("pages/a.js"), &err);
        match ev {
            CompilerEvent::Error { message, stack, .. } => {
                assert_eq!(message, "pages/a.js: transform failed: Unexpected token (3:4)");
                assert_eq!(
                    stack,
                    "pages/a.js: SyntaxError: Unexpected token\n    at parse (parser.js:10)"
                );
                assert!(!stack.contains("Transform {"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }
}
