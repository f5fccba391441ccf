// src/compiler/mod.rs

//! Dependency-tracked compilation.
//!
//! Compiles files and directory trees, discovers local imports through the
//! [`Transformer`], compiles those recursively and records who imported what
//! in the [`BuildLedger`] so changes can cascade to every importer.

pub mod assets;
pub mod build;
pub mod events;
pub mod ledger;
pub mod resolve;
pub mod transform;

pub use build::{CompileOptions, Compiler};
pub use events::{CompilerEvent, RequestId, Responder};
pub use ledger::{Acquire, BuildLedger, Completion, RebuildClaim, TargetState};
pub use transform::{
    ImportScanner, TransformFailure, TransformFuture, TransformOptions, TransformOutput,
    Transformer,
};
