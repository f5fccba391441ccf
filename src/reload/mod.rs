// src/reload/mod.rs

//! Deciding what live clients are told after a bundling pass.
//!
//! [`ReloadTracker`] keeps the last two page-chunk snapshots and diffs each
//! new pass against the last good one; [`Dispatcher`] turns the diff into one
//! `reload` or `change` notification per affected route.

pub mod diff;
pub mod dispatch;
pub mod route;
pub mod snapshot;

pub use diff::{ChunkDiff, diff};
pub use dispatch::{ChannelPublisher, Dispatcher, JsonLinesPublisher, Notification, Publisher};
pub use route::to_route;
pub use snapshot::{BundlePass, ChunkSnapshot, PageFilter, ReloadTracker};
