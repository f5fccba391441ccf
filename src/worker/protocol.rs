// src/worker/protocol.rs

//! Messages exchanged with the compile worker.
//!
//! Every request carries a correlation id and every response echoes it as
//! `callbackId`, so any number of outstanding requests can share one
//! channel pair.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compiler::{CompilerEvent, RequestId};
use crate::types::CompileCommand;

/// `{"callbackId": 7, "command": "build", "files": ["pages"]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    #[serde(rename = "callbackId")]
    pub id: RequestId,
    pub command: CompileCommand,
    pub files: Vec<PathBuf>,
}

/// `{"callbackId": 7, "event": "built", "totalCompiledFiles": 3}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResponse {
    #[serde(rename = "callbackId")]
    pub id: RequestId,
    #[serde(flatten)]
    pub event: CompilerEvent,
}
